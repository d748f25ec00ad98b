//! Planner error types.

use pegasus_catalog::CatalogError;
use pegasus_config::{ConfigError, FactoryError};
use pegasus_dax::DaxError;

/// Result type alias for planner operations.
pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("failed to read '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    /// The submit directory or one of its parents cannot be used.
    #[error("submit directory '{path}': {message}")]
    Directory { path: String, message: String },

    #[error("the site '{0}' is not loaded from the site catalog")]
    UnknownSite(String),

    #[error("no execution sites are available")]
    NoSites,

    /// No candidate site has an entry for the job's transformation.
    #[error("job '{job}': transformation '{transformation}' is not available on sites [{sites}]")]
    Unmapped {
        job: String,
        transformation: String,
        sites: String,
    },

    #[error("dependency cycle detected through job '{0}'")]
    Cycle(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}")]
    Submit { command: String, status: String },

    #[error(transparent)]
    Dax(#[from] DaxError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Factory(#[from] FactoryError),
}

impl PlannerError {
    /// The implementation-selection failure behind this error, if any.
    pub fn factory(&self) -> Option<&FactoryError> {
        match self {
            PlannerError::Factory(e) => Some(e),
            PlannerError::Catalog(CatalogError::Factory(e)) => Some(e),
            _ => None,
        }
    }
}
