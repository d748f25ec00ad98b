//! The replica catalog: physical locations of logical files.

pub mod file;
pub mod store;
pub mod yaml;

pub use store::{ReplicaEntry, ReplicaStore, SITE_ATTRIBUTE};

use pegasus_config::{FactoryError, PegasusProperties, Registration, select};

use crate::error::Result;
use crate::handle::{Catalog, CatalogFormat, OpenMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcFormat {
    File,
    Yaml,
}

const MODULE: &str = "replica catalog";

const REGISTRY: &[Registration<RcFormat>] = &[("File", RcFormat::File), ("YAML", RcFormat::Yaml)];

impl RcFormat {
    pub fn select(name: &str) -> std::result::Result<Self, FactoryError> {
        select(MODULE, name, REGISTRY)
    }

    pub fn name(self) -> &'static str {
        match self {
            RcFormat::File => "File",
            RcFormat::Yaml => "YAML",
        }
    }
}

impl CatalogFormat for RcFormat {
    type Store = ReplicaStore;
    const MODULE: &'static str = MODULE;

    fn load(self, text: &str, path: &str) -> Result<ReplicaStore> {
        let entries = match self {
            RcFormat::File => file::parse(text, path)?,
            RcFormat::Yaml => yaml::parse(text)?,
        };
        let mut store = ReplicaStore::new();
        store.extend(entries);
        Ok(store)
    }

    fn save(self, store: &ReplicaStore) -> Result<String> {
        match self {
            RcFormat::File => Ok(file::render(store)),
            RcFormat::Yaml => yaml::render(store),
        }
    }
}

pub type ReplicaCatalog = Catalog<RcFormat>;

/// Opens the catalog named by `pegasus.catalog.replica` and
/// `pegasus.catalog.replica.file`.
pub fn connect(props: &PegasusProperties, mode: OpenMode) -> Result<ReplicaCatalog> {
    let format = RcFormat::select(props.replica_catalog())?;
    Catalog::open(format, props.replica_catalog_file(), mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_select_rejects_database_backends() {
        assert_eq!(RcFormat::select("file").unwrap(), RcFormat::File);
        let err = RcFormat::select("JDBCRC").unwrap_err();
        assert!(err.to_string().contains("replica catalog"));
    }

    #[test]
    fn test_file_to_yaml() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("rc.data");
        std::fs::write(&input, "f.a file:///f.a site=\"local\"\n").unwrap();

        let source = Catalog::open(RcFormat::File, &input, OpenMode::Read).unwrap();
        let output_path = dir.path().join("replicas.yml");
        let mut output = Catalog::create(RcFormat::Yaml, &output_path);
        output
            .store_mut()
            .unwrap()
            .extend(source.store().unwrap().entries().cloned());
        output.close().unwrap();

        let text = std::fs::read_to_string(&output_path).unwrap();
        assert!(text.contains("lfn: f.a"));
        assert!(text.contains("site: local"));
    }
}
