use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::common::{Arch, CatalogProfile, Os, upsert_profile};
use crate::error::CatalogError;

/// The role of a directory on a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DirectoryType {
    SharedScratch,
    SharedStorage,
    LocalScratch,
    LocalStorage,
}

impl DirectoryType {
    /// The XML spelling, e.g. `shared-scratch`.
    pub fn xml_name(self) -> &'static str {
        match self {
            DirectoryType::SharedScratch => "shared-scratch",
            DirectoryType::SharedStorage => "shared-storage",
            DirectoryType::LocalScratch => "local-scratch",
            DirectoryType::LocalStorage => "local-storage",
        }
    }

    /// The YAML spelling, e.g. `sharedScratch`.
    pub fn yaml_name(self) -> &'static str {
        match self {
            DirectoryType::SharedScratch => "sharedScratch",
            DirectoryType::SharedStorage => "sharedStorage",
            DirectoryType::LocalScratch => "localScratch",
            DirectoryType::LocalStorage => "localStorage",
        }
    }

    pub fn is_scratch(self) -> bool {
        matches!(self, DirectoryType::SharedScratch | DirectoryType::LocalScratch)
    }

    pub fn is_shared(self) -> bool {
        matches!(self, DirectoryType::SharedScratch | DirectoryType::SharedStorage)
    }
}

impl FromStr for DirectoryType {
    type Err = CatalogError;

    /// Accepts both spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "sharedscratch" => Ok(DirectoryType::SharedScratch),
            "sharedstorage" => Ok(DirectoryType::SharedStorage),
            "localscratch" => Ok(DirectoryType::LocalScratch),
            "localstorage" => Ok(DirectoryType::LocalStorage),
            _ => Err(CatalogError::invalid(format!("unknown directory type '{s}'"))),
        }
    }
}

impl fmt::Display for DirectoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.xml_name())
    }
}

/// Which transfers a file server takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Operation {
    #[default]
    All,
    Get,
    Put,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::All => "all",
            Operation::Get => "get",
            Operation::Put => "put",
        }
    }
}

impl FromStr for Operation {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Operation::All),
            "get" => Ok(Operation::Get),
            "put" => Ok(Operation::Put),
            other => Err(CatalogError::invalid(format!("unknown file server operation '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileServer {
    pub operation: Operation,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    pub dir_type: DirectoryType,
    pub path: String,
    pub file_servers: Vec<FileServer>,
}

impl Directory {
    pub fn new(dir_type: DirectoryType, path: impl Into<String>) -> Self {
        Self {
            dir_type,
            path: path.into(),
            file_servers: Vec::new(),
        }
    }

    pub fn with_file_server(mut self, operation: Operation, url: impl Into<String>) -> Self {
        self.file_servers.push(FileServer {
            operation,
            url: url.into(),
        });
        self
    }
}

/// A job submission endpoint of a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridGateway {
    /// e.g. `gt5`, `condor`, `batch`.
    pub grid_type: String,
    pub contact: String,
    /// e.g. `fork`, `pbs`, `slurm`.
    pub scheduler: String,
    /// `compute` or `auxillary`; absent means both.
    pub job_type: Option<String>,
}

/// An execution site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteEntry {
    pub handle: String,
    pub arch: Arch,
    pub os: Os,
    pub os_release: Option<String>,
    pub os_version: Option<String>,
    pub glibc: Option<String>,
    pub grids: Vec<GridGateway>,
    pub directories: Vec<Directory>,
    pub profiles: Vec<CatalogProfile>,
}

impl SiteEntry {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            arch: Arch::default(),
            os: Os::default(),
            os_release: None,
            os_version: None,
            glibc: None,
            grids: Vec::new(),
            directories: Vec::new(),
            profiles: Vec::new(),
        }
    }

    pub fn add_profile(&mut self, profile: CatalogProfile) {
        upsert_profile(&mut self.profiles, profile);
    }

    pub fn directory(&self, dir_type: DirectoryType) -> Option<&Directory> {
        self.directories.iter().find(|d| d.dir_type == dir_type)
    }

    /// The shared scratch path, falling back to local scratch.
    pub fn scratch_path(&self) -> Option<&str> {
        self.directory(DirectoryType::SharedScratch)
            .or_else(|| self.directory(DirectoryType::LocalScratch))
            .map(|d| d.path.as_str())
    }

    /// Value of the `env` profile `key`.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.profiles
            .iter()
            .find(|p| p.namespace == "env" && p.key == key)
            .map(|p| p.value.as_str())
    }
}

/// In-memory site catalog keyed by handle.
#[derive(Debug, Clone, Default)]
pub struct SiteStore {
    sites: BTreeMap<String, SiteEntry>,
}

impl SiteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a site; returns the previous entry.
    pub fn insert(&mut self, site: SiteEntry) -> Option<SiteEntry> {
        self.sites.insert(site.handle.clone(), site)
    }

    pub fn lookup(&self, handle: &str) -> Option<&SiteEntry> {
        self.sites.get(handle)
    }

    pub fn remove(&mut self, handle: &str) -> Option<SiteEntry> {
        self.sites.remove(handle)
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.sites.contains_key(handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SiteEntry> {
        self.sites.values()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl Extend<SiteEntry> for SiteStore {
    fn extend<I: IntoIterator<Item = SiteEntry>>(&mut self, iter: I) {
        for site in iter {
            self.insert(site);
        }
    }
}
