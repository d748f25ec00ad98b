use std::fmt;
use std::str::FromStr;

use crate::common::{CatalogProfile, SysInfo, upsert_profile};
use crate::error::CatalogError;

/// Whether an executable is already present on a site or must be staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TcType {
    #[default]
    Installed,
    Stageable,
}

impl TcType {
    pub fn as_str(self) -> &'static str {
        match self {
            TcType::Installed => "INSTALLED",
            TcType::Stageable => "STAGEABLE",
        }
    }
}

impl FromStr for TcType {
    type Err = CatalogError;

    /// Also accepts the legacy `STATIC_BINARY` and `DYNAMIC_BINARY`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSTALLED" | "DYNAMIC_BINARY" => Ok(TcType::Installed),
            "STAGEABLE" | "STATIC_BINARY" => Ok(TcType::Stageable),
            other => Err(CatalogError::invalid(format!(
                "unknown transformation type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for TcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combines `ns::name:version`, leaving out absent parts.
pub fn logical_name(namespace: Option<&str>, name: &str, version: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(ns) = namespace.filter(|s| !s.is_empty()) {
        out.push_str(ns);
        out.push_str("::");
    }
    out.push_str(name);
    if let Some(v) = version.filter(|s| !s.is_empty()) {
        out.push(':');
        out.push_str(v);
    }
    out
}

/// Splits `ns::name:version` into its parts.
pub fn split_logical_name(s: &str) -> (Option<String>, String, Option<String>) {
    let (namespace, rest) = match s.split_once("::") {
        Some((ns, rest)) => (Some(ns.to_string()).filter(|n| !n.is_empty()), rest),
        None => (None, s),
    };
    let (name, version) = match rest.split_once(':') {
        Some((name, v)) => (name, Some(v.to_string()).filter(|v| !v.is_empty())),
        None => (rest, None),
    };
    (namespace, name.to_string(), version)
}

/// One executable of a logical transformation on one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationEntry {
    pub namespace: Option<String>,
    pub name: String,
    pub version: Option<String>,
    /// The site (resource) handle.
    pub site: String,
    pub pfn: String,
    pub tc_type: TcType,
    pub sysinfo: SysInfo,
    pub profiles: Vec<CatalogProfile>,
}

impl TransformationEntry {
    pub fn new(lfn: &str, site: impl Into<String>, pfn: impl Into<String>) -> Self {
        let (namespace, name, version) = split_logical_name(lfn);
        Self {
            namespace,
            name,
            version,
            site: site.into(),
            pfn: pfn.into(),
            tc_type: TcType::default(),
            sysinfo: SysInfo::default(),
            profiles: Vec::new(),
        }
    }

    pub fn with_type(mut self, tc_type: TcType) -> Self {
        self.tc_type = tc_type;
        self
    }

    pub fn with_sysinfo(mut self, sysinfo: SysInfo) -> Self {
        self.sysinfo = sysinfo;
        self
    }

    pub fn logical_name(&self) -> String {
        logical_name(self.namespace.as_deref(), &self.name, self.version.as_deref())
    }

    pub fn add_profile(&mut self, profile: CatalogProfile) {
        upsert_profile(&mut self.profiles, profile);
    }

    /// Same logical transformation, site, pfn and type.
    pub(crate) fn same_slot(&self, other: &TransformationEntry) -> bool {
        self.site == other.site
            && self.pfn == other.pfn
            && self.tc_type == other.tc_type
            && self.logical_name() == other.logical_name()
    }
}

impl fmt::Display for TransformationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.site,
            self.logical_name(),
            self.pfn,
            self.tc_type,
            self.sysinfo.to_column()
        )
    }
}
