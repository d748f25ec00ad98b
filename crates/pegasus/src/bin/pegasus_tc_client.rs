//! Transformation catalog client.

use std::process::ExitCode;

use pegasus::commands::tc_client::{self, TcClientArgs};

fn main() -> ExitCode {
    pegasus::cli::run::<TcClientArgs, _>(tc_client::run)
}
