//! Replica catalog format converter.

use std::process::ExitCode;

use pegasus::commands::rc_converter::{self, RcConverterArgs};

fn main() -> ExitCode {
    pegasus::cli::run::<RcConverterArgs, _>(rc_converter::run)
}
