//! pegasus-sc-converter: converts site catalogs between XML versions and YAML.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{debug, info};

use pegasus_catalog::{Catalog, OpenMode, ScFormat, SiteStore};
use pegasus_planner::split_list;

use super::Context;
use crate::cli::{GlobalArgs, Tool};
use crate::exit::usage;

/// Convert a site catalog to another format
#[derive(Parser, Debug)]
#[command(name = "pegasus-sc-converter", author, version, about, long_about = None)]
pub struct ScConverterArgs {
    /// Input files, comma-separated (repeatable)
    #[arg(short = 'i', long, value_name = "FILES")]
    pub input: Vec<String>,

    /// Output file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format: XML, XML3, XML4 or YAML
    #[arg(short = 'O', long, value_name = "FORMAT", default_value = "YAML")]
    pub oformat: String,

    /// Expand variables in the input
    #[arg(short = 'e', long)]
    pub expand: bool,

    #[command(flatten)]
    pub globals: GlobalArgs,
}

impl Tool for ScConverterArgs {
    const NAME: &'static str = "pegasus-sc-converter";

    fn globals(&self) -> GlobalArgs {
        self.globals.clone()
    }
}

/// YAML for `.yml`/`.yaml` files, XML (either schema version) otherwise.
pub fn input_format(path: &Path) -> ScFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => ScFormat::Yaml,
        _ => ScFormat::Xml,
    }
}

/// Run pegasus-sc-converter.
pub fn run(args: ScConverterArgs, _ctx: &Context) -> Result<()> {
    let output_format = ScFormat::select(&args.oformat)?;
    let inputs = split_list(&args.input);
    if inputs.is_empty() {
        return Err(usage("input files not specified, use --input"));
    }
    let output = args.output.as_ref().ok_or_else(|| usage("output file not specified, use --output"))?;
    if args.expand {
        debug!("variable expansion requested; file catalogs are read verbatim");
    }

    let mut merged = SiteStore::new();
    for input in &inputs {
        let path = Path::new(input);
        let catalog = Catalog::open(input_format(path), path, OpenMode::Read)
            .with_context(|| format!("failed to parse site catalog '{input}'"))?;
        let store = catalog.store()?;
        debug!(file = %input, sites = store.len(), "loaded sites");
        merged.extend(store.entries().cloned());
    }

    let mut target = Catalog::create(output_format, output);
    target.store_mut()?.extend(merged.entries().cloned());
    target
        .close()
        .with_context(|| format!("failed to write '{}'", output.display()))?;
    info!(sites = merged.len(), format = output_format.name(), "converted site catalog");
    println!("Written out the converted file to {}", output.display());
    Ok(())
}
