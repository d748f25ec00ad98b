//! Site catalog format converter.

use std::process::ExitCode;

use pegasus::commands::sc_converter::{self, ScConverterArgs};

fn main() -> ExitCode {
    pegasus::cli::run::<ScConverterArgs, _>(sc_converter::run)
}
