//! Tool handlers.

pub mod dax_validator;
pub mod partitiondax;
pub mod plan;
pub mod properties_converter;
pub mod rank_dax;
pub mod rc_client;
pub mod rc_converter;
pub mod sc_converter;
pub mod tc_client;
pub mod tc_converter;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use tracing::{debug, warn};

use pegasus_config::{LoadOptions, PegasusProperties, load_properties};

use crate::cli::GlobalArgs;

/// Shared context for all handlers.
#[derive(Debug, Clone)]
pub struct Context {
    /// Binary name, for messages.
    pub tool: &'static str,
    pub verbose: u8,
    /// `--conf` file, replacing the project properties layer.
    pub conf: Option<PathBuf>,
    /// `-Dkey=value` overrides in command-line order.
    pub overrides: Vec<(String, String)>,
}

impl Context {
    pub fn new(tool: &'static str, globals: &GlobalArgs, overrides: Vec<(String, String)>) -> Self {
        Self {
            tool,
            verbose: globals.verbose,
            conf: globals.conf.clone(),
            overrides,
        }
    }

    /// Loads the layered properties. Tools that touch catalogs or the
    /// planner call this; the others never need a Pegasus home.
    pub fn properties(&self) -> Result<PegasusProperties> {
        let loaded = load_properties(&LoadOptions {
            conf: self.conf.clone(),
            overrides: self.overrides.clone(),
            ..Default::default()
        })
        .context("unable to load the Pegasus properties")?;
        for warning in &loaded.warnings {
            warn!("{warning}");
        }
        debug!(sources = ?loaded.loaded_from(), "loaded properties");
        Ok(loaded.properties)
    }
}
