//! Converts old-style properties files.

use std::process::ExitCode;

use pegasus::commands::properties_converter::{self, PropertiesConverterArgs};

fn main() -> ExitCode {
    pegasus::cli::run::<PropertiesConverterArgs, _>(properties_converter::run)
}
