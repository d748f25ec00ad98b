//! Configuration and implementation-selection error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading, resolving or converting properties.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a properties file.
    #[error("failed to read properties file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write a properties file.
    #[error("failed to write properties file '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    /// Malformed escape or line in a properties file.
    #[error("malformed properties at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A required property is not set and cannot be derived.
    #[error("required property '{key}' is not set (set it or define pegasus.home / PEGASUS_HOME)")]
    MissingProperty { key: String },

    /// A property holds a value of the wrong shape.
    #[error("property '{key}' has invalid value '{value}'")]
    InvalidValue { key: String, value: String },

    /// A `-Dkey=value` override without `=`.
    #[error("invalid property override '{0}', expected key=value")]
    InvalidOverride(String),

    /// An output location is unusable.
    #[error("directory '{path}': {message}")]
    Directory { path: String, message: String },

    /// A conversion pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A named pluggable implementation could not be selected or constructed.
#[derive(Debug, thiserror::Error)]
#[error("unable to instantiate {module} implementation '{implementation}': {reason}")]
pub struct FactoryError {
    /// The subsystem being configured, e.g. "transformation catalog".
    pub module: String,
    /// The implementation that was requested.
    pub implementation: String,
    /// Why it could not be used.
    pub reason: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl FactoryError {
    pub fn new(
        module: impl Into<String>,
        implementation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            implementation: implementation.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}
