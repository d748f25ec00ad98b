//! Replica catalog client.

use std::process::ExitCode;

use pegasus::commands::rc_client::{self, RcClientArgs};

fn main() -> ExitCode {
    pegasus::cli::run::<RcClientArgs, _>(rc_client::run)
}
