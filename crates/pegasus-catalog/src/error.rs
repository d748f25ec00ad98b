//! Catalog error types.

use pegasus_config::FactoryError;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors raised while reading, querying or writing catalogs.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write catalog '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    /// Malformed text or file-format catalog.
    #[error("{path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("malformed YAML catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("malformed XML catalog at byte {position}: {source}")]
    Xml {
        position: usize,
        source: quick_xml::Error,
    },

    /// Structurally valid input describing an impossible entry.
    #[error("invalid catalog entry: {0}")]
    InvalidEntry(String),

    /// The catalog was closed and cannot be used.
    #[error("catalog '{0}' is closed")]
    Closed(String),

    /// A write was attempted on a read-only catalog.
    #[error("catalog '{0}' was opened read-only")]
    ReadOnly(String),

    #[error(transparent)]
    Factory(#[from] FactoryError),
}

impl CatalogError {
    pub(crate) fn parse(path: &str, line: usize, message: impl Into<String>) -> Self {
        CatalogError::Parse {
            path: path.to_string(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        CatalogError::InvalidEntry(message.into())
    }
}
