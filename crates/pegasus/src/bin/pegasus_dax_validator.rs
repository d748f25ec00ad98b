//! Validates a DAX file.

use std::process::ExitCode;

use pegasus::commands::dax_validator::{self, ValidatorArgs};

fn main() -> ExitCode {
    pegasus::cli::run::<ValidatorArgs, _>(dax_validator::run)
}
