//! Transformation catalog format converter.

use std::process::ExitCode;

use pegasus::commands::tc_converter::{self, TcConverterArgs};

fn main() -> ExitCode {
    pegasus::cli::run::<TcConverterArgs, _>(tc_converter::run)
}
