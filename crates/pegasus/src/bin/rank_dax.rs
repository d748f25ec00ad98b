//! Ranks DAXes by estimated runtime.

use std::process::ExitCode;

use pegasus::commands::rank_dax::{self, RankArgs};

fn main() -> ExitCode {
    pegasus::cli::run::<RankArgs, _>(rank_dax::run)
}
