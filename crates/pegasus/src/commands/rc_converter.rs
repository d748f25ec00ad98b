//! pegasus-rc-converter: converts replica catalogs between File and YAML.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{debug, info};

use pegasus_catalog::{Catalog, OpenMode, RcFormat, ReplicaStore};
use pegasus_planner::split_list;

use super::Context;
use crate::cli::{GlobalArgs, Tool};
use crate::exit::usage;

/// Convert a replica catalog from one format to another
#[derive(Parser, Debug)]
#[command(name = "pegasus-rc-converter", author, version, about, long_about = None)]
pub struct RcConverterArgs {
    /// Input files, comma-separated (repeatable)
    #[arg(short = 'i', long, value_name = "FILES")]
    pub input: Vec<String>,

    /// Input format: File or YAML
    #[arg(short = 'I', long, value_name = "FORMAT", default_value = "File")]
    pub iformat: String,

    /// Output file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format: File or YAML
    #[arg(short = 'O', long, value_name = "FORMAT", default_value = "YAML")]
    pub oformat: String,

    /// Expand variables in the input
    #[arg(short = 'e', long)]
    pub expand: bool,

    #[command(flatten)]
    pub globals: GlobalArgs,
}

impl Tool for RcConverterArgs {
    const NAME: &'static str = "pegasus-rc-converter";

    fn globals(&self) -> GlobalArgs {
        self.globals.clone()
    }
}

/// Run pegasus-rc-converter.
pub fn run(args: RcConverterArgs, _ctx: &Context) -> Result<()> {
    let input_format = RcFormat::select(&args.iformat)?;
    let output_format = RcFormat::select(&args.oformat)?;
    let inputs = split_list(&args.input);
    if inputs.is_empty() {
        return Err(usage("input files not specified, use --input"));
    }
    let output = args.output.as_ref().ok_or_else(|| usage("output file not specified, use --output"))?;
    if args.expand {
        debug!("variable expansion requested; file catalogs are read verbatim");
    }

    let mut merged = ReplicaStore::new();
    for input in &inputs {
        let catalog = Catalog::open(input_format, input, OpenMode::Read)
            .with_context(|| format!("failed to parse replica catalog '{input}'"))?;
        let store = catalog.store()?;
        debug!(file = %input, replicas = store.len(), "loaded replicas");
        merged.extend(store.entries().cloned());
    }

    let mut target = Catalog::create(output_format, output);
    target.store_mut()?.extend(merged.entries().cloned());
    target
        .close()
        .with_context(|| format!("failed to write '{}'", output.display()))?;
    info!(replicas = merged.len(), "converted replica catalog");
    println!(
        "Successfully converted replica catalog from {} to {}",
        input_format.name(),
        output_format.name()
    );
    Ok(())
}
