//! Splits a DAX into partitions.

use std::process::ExitCode;

use pegasus::commands::partitiondax::{self, PartitionArgs};

fn main() -> ExitCode {
    pegasus::cli::run::<PartitionArgs, _>(partitiondax::run)
}
