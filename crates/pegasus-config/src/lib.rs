//! Properties for the Pegasus planning toolkit.
//!
//! Loads Java-style properties from the system, user and project layers,
//! resolves the home directories every tool needs, selects pluggable
//! implementations by property value, and converts legacy `vds.*` names.

pub mod convert;
pub mod discovery;
pub mod error;
pub mod factory;
pub mod properties;
pub mod settings;

pub use convert::{Conversion, PropertyConverter};
pub use discovery::{LoadOptions, LoadedProperties, PropertySource, load_properties, parse_override};
pub use error::{ConfigError, FactoryError, Result};
pub use factory::{Registration, select};
pub use properties::Properties;
pub use settings::{PegasusProperties, SubmitDirMode};
