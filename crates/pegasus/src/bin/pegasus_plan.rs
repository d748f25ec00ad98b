//! Plans a DAX into an executable workflow.

use std::process::ExitCode;

use pegasus::commands::plan::{self, PlanArgs};

fn main() -> ExitCode {
    pegasus::cli::run::<PlanArgs, _>(plan::run)
}
