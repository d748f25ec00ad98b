//! Error types for the DAX object model and parser.

/// Result type alias for DAX operations.
pub type Result<T> = std::result::Result<T, DaxError>;

/// Errors raised while building, walking or parsing abstract workflows.
#[derive(Debug, thiserror::Error)]
pub enum DaxError {
    /// A code or textual value is outside its enumeration.
    #[error("invalid {kind} value '{value}'")]
    InvalidArgument { kind: &'static str, value: String },

    /// A walk over the dependency records came back to a job on its own path.
    #[error("dependency cycle detected through job '{id}'")]
    CyclicGraph { id: String },

    /// Failed to read a DAX file.
    #[error("failed to read DAX file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write a DAX file.
    #[error("failed to write DAX file '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    /// Malformed XML.
    #[error("malformed XML at byte {position}: {source}")]
    Xml {
        position: usize,
        source: quick_xml::Error,
    },

    /// Well-formed XML that does not follow the DAX layout.
    #[error("invalid DAX at byte {position}: {message}")]
    Structure { position: usize, message: String },

    /// Formatting into the output buffer failed.
    #[error("failed to format output: {0}")]
    Format(#[from] std::fmt::Error),
}

impl DaxError {
    pub(crate) fn invalid(kind: &'static str, value: impl Into<String>) -> Self {
        DaxError::InvalidArgument {
            kind,
            value: value.into(),
        }
    }
}
