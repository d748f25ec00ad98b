//! pegasus-properties-converter: rewrites old property names.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;

use pegasus_config::PropertyConverter;

use super::Context;
use crate::cli::{GlobalArgs, Tool};

/// Convert an old properties file to the current property names
#[derive(Parser, Debug)]
#[command(name = "pegasus-properties-converter", author, version, about, long_about = None)]
pub struct PropertiesConverterArgs {
    /// The properties file to convert
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: PathBuf,

    /// Directory the converted file is written to
    #[arg(short = 'o', long = "output", value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub globals: GlobalArgs,
}

impl Tool for PropertiesConverterArgs {
    const NAME: &'static str = "pegasus-properties-converter";

    fn globals(&self) -> GlobalArgs {
        self.globals.clone()
    }
}

/// Run pegasus-properties-converter.
pub fn run(args: PropertiesConverterArgs, _ctx: &Context) -> Result<()> {
    let converter = PropertyConverter::new()?;
    let written = converter
        .convert_file(&args.input, &args.dir)
        .with_context(|| format!("unable to convert '{}'", args.input.display()))?;
    println!("Pegasus Properties Written out to file {}", written.display());
    Ok(())
}
