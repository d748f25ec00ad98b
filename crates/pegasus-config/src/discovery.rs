//! Property file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `$PEGASUS_HOME/etc/properties` (system)
//! 2. `~/.pegasusrc` (user)
//! 3. `./pegasus.properties`, or the file given with `--conf`
//! 4. `-Dkey=value` overrides

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::properties::Properties;
use crate::settings::{HOME, HOME_ENV, PegasusProperties};

/// Default properties filename in the working directory.
const PROJECT_PROPERTIES_FILE: &str = "pegasus.properties";

/// User properties filename within the user directory.
const USER_PROPERTIES_FILE: &str = ".pegasusrc";

/// System properties file below the home directory.
const SYSTEM_PROPERTIES_FILE: &str = "etc/properties";

/// Environment variable to override the user properties directory.
const CONFIG_DIR_ENV: &str = "PEGASUS_CONFIG_DIR";

/// Tracks where each layer was loaded from.
#[derive(Debug, Clone)]
pub struct PropertySource {
    pub path: PathBuf,
    pub loaded: bool,
}

/// What to load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit properties file; replaces `./pegasus.properties` and must exist.
    pub conf: Option<PathBuf>,
    /// `-D` overrides, applied last.
    pub overrides: Vec<(String, String)>,
    /// Overrides `PEGASUS_CONFIG_DIR` and the home directory.
    pub user_dir: Option<PathBuf>,
    /// Directory searched for `pegasus.properties`; defaults to the CWD.
    pub project_dir: Option<PathBuf>,
    /// Overrides `PEGASUS_HOME`.
    pub home: Option<PathBuf>,
}

/// Result of discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedProperties {
    pub properties: PegasusProperties,
    /// Sources that were checked, lowest precedence first.
    pub sources: Vec<PropertySource>,
    /// Problems with optional layers.
    pub warnings: Vec<String>,
}

impl LoadedProperties {
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Parses a `-D` argument of the form `key=value`.
pub fn parse_override(arg: &str) -> Result<(String, String)> {
    let arg = arg.strip_prefix("-D").unwrap_or(arg);
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::InvalidOverride(arg.to_string())),
    }
}

/// Loads and resolves all property layers.
pub fn load_properties(options: &LoadOptions) -> Result<LoadedProperties> {
    let mut props = Properties::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let home = options
        .overrides
        .iter()
        .rev()
        .find(|(k, _)| k == HOME)
        .map(|(_, v)| PathBuf::from(v))
        .or_else(|| options.home.clone())
        .or_else(|| {
            std::env::var_os(HOME_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        });

    // 1. System
    if let Some(home) = &home {
        let path = home.join(SYSTEM_PROPERTIES_FILE);
        sources.push(load_layer(&mut props, &path, &mut warnings));
    }

    // 2. User
    if let Some(path) = user_properties_path(options.user_dir.as_deref()) {
        sources.push(load_layer(&mut props, &path, &mut warnings));
    }

    // 3. Project, or the explicit --conf file
    match &options.conf {
        Some(conf) => {
            props.merge(Properties::load(conf)?);
            sources.push(PropertySource {
                path: conf.clone(),
                loaded: true,
            });
        }
        None => {
            let path = options
                .project_dir
                .as_ref()
                .map(|d| d.join(PROJECT_PROPERTIES_FILE))
                .unwrap_or_else(|| PathBuf::from(PROJECT_PROPERTIES_FILE));
            sources.push(load_layer(&mut props, &path, &mut warnings));
        }
    }

    // 4. Command line
    for (key, value) in &options.overrides {
        debug!(key, value, "property override");
        props.set(key.clone(), value.clone());
    }

    let properties = PegasusProperties::resolve(props, home)?;
    Ok(LoadedProperties {
        properties,
        sources,
        warnings,
    })
}

/// `~/.pegasusrc`, or `$PEGASUS_CONFIG_DIR/.pegasusrc`.
pub fn user_properties_path(user_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = user_dir {
        return Some(dir.join(USER_PROPERTIES_FILE));
    }
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir).join(USER_PROPERTIES_FILE));
    }
    dirs::home_dir().map(|d| d.join(USER_PROPERTIES_FILE))
}

/// Try to load a properties file and merge it in. Failures become warnings.
fn load_layer(props: &mut Properties, path: &Path, warnings: &mut Vec<String>) -> PropertySource {
    if !path.is_file() {
        return PropertySource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match Properties::load(path) {
        Ok(layer) => {
            debug!(path = %path.display(), entries = layer.len(), "loaded properties");
            props.merge(layer);
            PropertySource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            PropertySource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
