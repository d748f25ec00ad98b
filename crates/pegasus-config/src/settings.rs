//! Resolved planner properties with typed accessors.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::properties::Properties;

// ── Keys ────────────────────────────────────────────────────────────────────

pub const HOME: &str = "pegasus.home";
pub const HOME_ENV: &str = "PEGASUS_HOME";
pub const BINDIR: &str = "pegasus.home.bindir";
pub const SCHEMADIR: &str = "pegasus.home.schemadir";
pub const SHAREDSTATEDIR: &str = "pegasus.home.sharedstatedir";
pub const SYSCONFDIR: &str = "pegasus.home.sysconfdir";

pub const TC_IMPL: &str = "pegasus.catalog.transformation";
pub const TC_FILE: &str = "pegasus.catalog.transformation.file";
pub const RC_IMPL: &str = "pegasus.catalog.replica";
pub const RC_FILE: &str = "pegasus.catalog.replica.file";
pub const SC_IMPL: &str = "pegasus.catalog.site";
pub const SC_FILE: &str = "pegasus.catalog.site.file";
pub const CODE_GENERATOR: &str = "pegasus.code.generator";
pub const SUBMIT_MODE: &str = "pegasus.dir.submit.mode";
pub const DAX_SCHEMA: &str = "pegasus.schema.dax";
pub const VOGROUP: &str = "pegasus.vogroup";
pub const USER_PROPERTIES: &str = "pegasus.user.properties";

/// Required directory keys and their location below the home directory.
const REQUIRED_DIRS: &[(&str, &str)] = &[
    (BINDIR, "bin"),
    (SCHEMADIR, "share/pegasus/schema"),
    (SHAREDSTATEDIR, "share/pegasus"),
    (SYSCONFDIR, "etc"),
];

/// How run directories below the base submit directory are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitDirMode {
    /// `runNNNN`, one past the highest existing run.
    #[default]
    RunNumber,
    /// A timestamp.
    Timestamp,
}

/// The property set a tool runs with.
///
/// Constructed once at startup and passed by reference; the home directory
/// keys are guaranteed present.
#[derive(Debug, Clone)]
pub struct PegasusProperties {
    props: Properties,
}

impl PegasusProperties {
    /// Validates `props`, deriving missing home directories from
    /// `pegasus.home` or `env_home`.
    pub fn resolve(mut props: Properties, env_home: Option<PathBuf>) -> Result<Self> {
        let home = props.get(HOME).map(PathBuf::from).or(env_home);

        for (key, relative) in REQUIRED_DIRS {
            if props.contains(key) {
                continue;
            }
            match &home {
                Some(home) => {
                    let derived = home.join(relative);
                    debug!(key, path = %derived.display(), "derived home directory");
                    props.set(*key, derived.display().to_string());
                }
                None => {
                    return Err(ConfigError::MissingProperty {
                        key: (*key).to_string(),
                    });
                }
            }
        }
        if let Some(home) = home
            && !props.contains(HOME)
        {
            props.set(HOME, home.display().to_string());
        }
        Ok(Self { props })
    }

    /// Like [`resolve`](Self::resolve), reading `PEGASUS_HOME`.
    pub fn from_properties(props: Properties) -> Result<Self> {
        let env_home = std::env::var_os(HOME_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::resolve(props, env_home)
    }

    pub fn properties(&self) -> &Properties {
        &self.props
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.props.set(key, value);
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.props
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.props.get(key).map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            _ => default,
        }
    }

    // ── Home directories ────────────────────────────────────────────────────

    fn dir(&self, key: &str) -> PathBuf {
        // present after resolve()
        PathBuf::from(self.props.get(key).unwrap_or_default())
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.dir(BINDIR)
    }

    pub fn schema_dir(&self) -> PathBuf {
        self.dir(SCHEMADIR)
    }

    pub fn shared_state_dir(&self) -> PathBuf {
        self.dir(SHAREDSTATEDIR)
    }

    pub fn sysconf_dir(&self) -> PathBuf {
        self.dir(SYSCONFDIR)
    }

    /// The DAX schema location advertised in generated files.
    pub fn dax_schema(&self) -> PathBuf {
        self.props
            .get(DAX_SCHEMA)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.schema_dir().join("dax-2.1.xsd"))
    }

    // ── Catalogs ────────────────────────────────────────────────────────────

    pub fn transformation_catalog(&self) -> &str {
        self.get_or(TC_IMPL, "Text")
    }

    pub fn transformation_catalog_file(&self) -> PathBuf {
        self.catalog_file(TC_FILE, "tc.text")
    }

    pub fn replica_catalog(&self) -> &str {
        self.get_or(RC_IMPL, "File")
    }

    pub fn replica_catalog_file(&self) -> PathBuf {
        self.catalog_file(RC_FILE, "rc.data")
    }

    pub fn site_catalog(&self) -> &str {
        self.get_or(SC_IMPL, "XML")
    }

    pub fn site_catalog_file(&self) -> PathBuf {
        self.catalog_file(SC_FILE, "sites.xml")
    }

    fn catalog_file(&self, key: &str, default_name: &str) -> PathBuf {
        match self.props.get(key).map(str::trim).filter(|v| !v.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => self.sysconf_dir().join(default_name),
        }
    }

    // ── Planner ─────────────────────────────────────────────────────────────

    pub fn code_generator(&self) -> &str {
        self.get_or(CODE_GENERATOR, "Condor")
    }

    pub fn submit_dir_mode(&self) -> SubmitDirMode {
        if self.get_or(SUBMIT_MODE, "").eq_ignore_ascii_case("timestamp") {
            SubmitDirMode::Timestamp
        } else {
            SubmitDirMode::RunNumber
        }
    }

    pub fn vogroup(&self) -> &str {
        self.get_or(VOGROUP, "pegasus")
    }

    /// Writes the full property set into `dir` as
    /// `pegasus.<timestamp>.properties`, returning the file path.
    pub fn write_out(&self, dir: &Path) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%dT%H%M%S").to_string();
        let path = unique_path(dir, &format!("pegasus.{stamp}"), "properties");
        let header = format!(
            "PEGASUS USER PROPERTIES\nGENERATED AT {}",
            Local::now().to_rfc3339()
        );
        self.props.store(&path, Some(&header))?;
        Ok(path)
    }
}

/// `dir/stem.ext`, or `dir/stem.N.ext` for the first free `N`.
pub(crate) fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.{ext}"));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{stem}.{n}.{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_derives_home_directories() {
        let props = PegasusProperties::resolve(Properties::new(), Some(PathBuf::from("/opt/pegasus")))
            .unwrap();
        assert_eq!(props.bin_dir(), PathBuf::from("/opt/pegasus/bin"));
        assert_eq!(
            props.schema_dir(),
            PathBuf::from("/opt/pegasus/share/pegasus/schema")
        );
        assert_eq!(props.sysconf_dir(), PathBuf::from("/opt/pegasus/etc"));
        assert_eq!(props.get(HOME), Some("/opt/pegasus"));
    }

    #[test]
    fn test_explicit_keys_win_over_home() {
        let mut raw = Properties::new();
        raw.set(HOME, "/home/p");
        raw.set(BINDIR, "/usr/bin");
        let props = PegasusProperties::resolve(raw, None).unwrap();
        assert_eq!(props.bin_dir(), PathBuf::from("/usr/bin"));
        assert_eq!(props.sysconf_dir(), PathBuf::from("/home/p/etc"));
    }

    #[test]
    fn test_missing_home_is_fatal() {
        let err = PegasusProperties::resolve(Properties::new(), None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingProperty { ref key } if key == BINDIR));
    }

    #[test]
    fn test_defaults() {
        let props = PegasusProperties::resolve(Properties::new(), Some(PathBuf::from("/p"))).unwrap();
        assert_eq!(props.transformation_catalog(), "Text");
        assert_eq!(props.replica_catalog(), "File");
        assert_eq!(props.site_catalog(), "XML");
        assert_eq!(props.code_generator(), "Condor");
        assert_eq!(props.submit_dir_mode(), SubmitDirMode::RunNumber);
        assert_eq!(props.site_catalog_file(), PathBuf::from("/p/etc/sites.xml"));
        assert_eq!(props.dax_schema(), PathBuf::from("/p/share/pegasus/schema/dax-2.1.xsd"));
    }

    #[test]
    fn test_write_out() {
        let dir = TempDir::new().unwrap();
        let mut raw = Properties::new();
        raw.set(CODE_GENERATOR, "Shell");
        let props = PegasusProperties::resolve(raw, Some(dir.path().to_path_buf())).unwrap();

        let first = props.write_out(dir.path()).unwrap();
        let second = props.write_out(dir.path()).unwrap();
        assert_ne!(first, second);

        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("pegasus.") && name.ends_with(".properties"));
        let reloaded = Properties::load(&first).unwrap();
        assert_eq!(reloaded.get(CODE_GENERATOR), Some("Shell"));
    }
}
