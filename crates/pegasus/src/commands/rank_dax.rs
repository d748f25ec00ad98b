//! rank-dax: orders the DAXes of a directory by estimated runtime.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{debug, info};

use pegasus_catalog::{OpenMode, transformation};
use pegasus_planner::{SiteFilter, rank, rank_directory, split_list};

use super::Context;
use crate::cli::{GlobalArgs, Tool};

/// Rank DAXes by the length of their critical path
#[derive(Parser, Debug)]
#[command(name = "rank-dax", author, version, about, long_about = None)]
pub struct RankArgs {
    /// Directory holding the *.dax files
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: PathBuf,

    /// Only rank DAXes runnable on these sites, comma-separated (repeatable)
    #[arg(short = 's', long, value_name = "SITES")]
    pub sites: Vec<String>,

    /// Write the ranking to FILE instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Keep only the N best DAXes
    #[arg(short = 'b', long, value_name = "N")]
    pub best: Option<usize>,

    #[command(flatten)]
    pub globals: GlobalArgs,
}

impl Tool for RankArgs {
    const NAME: &'static str = "rank-dax";

    fn globals(&self) -> GlobalArgs {
        self.globals.clone()
    }
}

/// Run rank-dax.
pub fn run(args: RankArgs, ctx: &Context) -> Result<()> {
    let sites = split_list(&args.sites);
    let rankings = if sites.is_empty() {
        rank_directory(&args.dir, None, args.best)?
    } else {
        let props = ctx.properties()?;
        let catalog = transformation::connect(&props, OpenMode::Read)
            .context("unable to connect to the transformation catalog")?;
        let filter = SiteFilter {
            transformations: catalog.store()?,
            sites: &sites,
        };
        debug!(sites = ?sites, "filtering by site");
        rank_directory(&args.dir, Some(filter), args.best)?
    };
    info!(ranked = rankings.len(), dir = %args.dir.display(), "ranked daxes");

    let text = rank::render(&rankings);
    match &args.output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("unable to write '{}'", path.display()))?;
        }
        None => print!("{text}"),
    }
    Ok(())
}
