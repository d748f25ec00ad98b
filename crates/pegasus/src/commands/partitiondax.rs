//! partitiondax: splits a DAX into partition DAXes and a PDAX.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::info;

use pegasus_planner::{Partitioner, write_partitions};

use super::Context;
use crate::cli::{GlobalArgs, Tool};

/// Partition a DAX into smaller DAXes
#[derive(Parser, Debug)]
#[command(name = "partitiondax", author, version, about, long_about = None)]
pub struct PartitionArgs {
    /// The DAX file to partition
    #[arg(short = 'd', long, value_name = "FILE")]
    pub dax: PathBuf,

    /// Directory the partitions are written to
    #[arg(short = 'D', long = "dir", value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Partitioning technique: BFS, One2One or Whole
    #[arg(short = 't', long = "type", value_name = "TYPE", default_value = "BFS")]
    pub kind: String,

    #[command(flatten)]
    pub globals: GlobalArgs,
}

impl Tool for PartitionArgs {
    const NAME: &'static str = "partitiondax";

    fn globals(&self) -> GlobalArgs {
        self.globals.clone()
    }
}

/// Run partitiondax.
pub fn run(args: PartitionArgs, _ctx: &Context) -> Result<()> {
    let partitioner = Partitioner::select(&args.kind)?;
    let dax = pegasus_dax::parse_file(&args.dax)
        .with_context(|| format!("unable to parse dax '{}'", args.dax.display()))?;
    info!(dax = %args.dax.display(), jobs = dax.job_count(), "loaded dax");

    let written = write_partitions(&dax, partitioner, &args.dir)?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}
