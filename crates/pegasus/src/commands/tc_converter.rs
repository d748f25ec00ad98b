//! pegasus-tc-converter: converts transformation catalogs between formats.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{debug, info};

use pegasus_catalog::{Catalog, OpenMode, TcFormat, TransformationStore};
use pegasus_planner::split_list;

use super::Context;
use crate::cli::{GlobalArgs, Tool};
use crate::exit::usage;

/// Convert a transformation catalog from one format to another
#[derive(Parser, Debug)]
#[command(name = "pegasus-tc-converter", author, version, about, long_about = None)]
pub struct TcConverterArgs {
    /// Input files, comma-separated (repeatable)
    #[arg(short = 'i', long, value_name = "FILES")]
    pub input: Vec<String>,

    /// Input format: Text, File or YAML
    #[arg(short = 'I', long, value_name = "FORMAT")]
    pub iformat: String,

    /// Output file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format: Text, File or YAML
    #[arg(short = 'O', long, value_name = "FORMAT")]
    pub oformat: String,

    /// Database user name
    #[arg(short = 'N', long = "db-user-name", value_name = "USER")]
    pub db_user: Option<String>,

    /// Database password
    #[arg(short = 'P', long = "db-user-password", value_name = "PASSWORD")]
    pub db_password: Option<String>,

    /// Database URL
    #[arg(short = 'U', long = "db-url", value_name = "URL")]
    pub db_url: Option<String>,

    /// Database host
    #[arg(short = 'H', long = "db-host", value_name = "HOST")]
    pub db_host: Option<String>,

    #[command(flatten)]
    pub globals: GlobalArgs,
}

impl Tool for TcConverterArgs {
    const NAME: &'static str = "pegasus-tc-converter";

    fn globals(&self) -> GlobalArgs {
        self.globals.clone()
    }
}

/// Run pegasus-tc-converter.
pub fn run(args: TcConverterArgs, _ctx: &Context) -> Result<()> {
    // Database backends fail here as factory errors.
    let input_format = TcFormat::select(&args.iformat)?;
    let output_format = TcFormat::select(&args.oformat)?;
    debug!(input = input_format.name(), output = output_format.name(), "formats");
    if args.db_user.is_some() || args.db_password.is_some() || args.db_url.is_some() || args.db_host.is_some() {
        debug!("database options are ignored for file-based formats");
    }

    let inputs = split_list(&args.input);
    if inputs.is_empty() {
        return Err(usage("input files not specified, use --input"));
    }
    let output = args.output.as_ref().ok_or_else(|| usage("output file not specified, use --output"))?;

    let mut merged = TransformationStore::new();
    for input in &inputs {
        let catalog = Catalog::open(input_format, input, OpenMode::Read)
            .with_context(|| format!("failed to parse transformation catalog '{input}'"))?;
        let store = catalog.store()?;
        debug!(file = %input, entries = store.len(), "loaded transformations");
        merged.extend(store.entries().cloned());
    }

    let mut target = Catalog::create(output_format, output);
    target.store_mut()?.extend(merged.entries().cloned());
    target
        .close()
        .with_context(|| format!("failed to write '{}'", output.display()))?;
    info!(entries = merged.len(), "converted transformation catalog");
    println!(
        "Successfully converted transformation catalog from {} to {}",
        input_format.name(),
        output_format.name()
    );
    Ok(())
}
