//! The transformation catalog: where the executables for logical
//! transformations live on each site.

pub mod entry;
pub mod file;
pub mod store;
pub mod text;
pub mod yaml;

pub use entry::{TcType, TransformationEntry, logical_name, split_logical_name};
pub use store::TransformationStore;

use pegasus_config::{FactoryError, PegasusProperties, Registration, select};

use crate::error::Result;
use crate::handle::{Catalog, CatalogFormat, OpenMode};

/// Supported transformation catalog formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcFormat {
    /// Multi-line `tr { site { } }` blocks.
    Text,
    /// One entry per line, in columns.
    File,
    Yaml,
}

const MODULE: &str = "transformation catalog";

const REGISTRY: &[Registration<TcFormat>] = &[
    ("Text", TcFormat::Text),
    ("File", TcFormat::File),
    ("YAML", TcFormat::Yaml),
];

impl TcFormat {
    /// Resolves an implementation name, case-insensitively.
    pub fn select(name: &str) -> std::result::Result<Self, FactoryError> {
        select(MODULE, name, REGISTRY)
    }

    pub fn name(self) -> &'static str {
        match self {
            TcFormat::Text => "Text",
            TcFormat::File => "File",
            TcFormat::Yaml => "YAML",
        }
    }
}

impl CatalogFormat for TcFormat {
    type Store = TransformationStore;
    const MODULE: &'static str = MODULE;

    fn load(self, text: &str, path: &str) -> Result<TransformationStore> {
        let entries = match self {
            TcFormat::Text => text::parse(text, path)?,
            TcFormat::File => file::parse(text, path)?,
            TcFormat::Yaml => yaml::parse(text)?,
        };
        let mut store = TransformationStore::new();
        store.extend(entries);
        Ok(store)
    }

    fn save(self, store: &TransformationStore) -> Result<String> {
        match self {
            TcFormat::Text => Ok(text::render(store)),
            TcFormat::File => Ok(file::render(store)),
            TcFormat::Yaml => yaml::render(store),
        }
    }
}

pub type TransformationCatalog = Catalog<TcFormat>;

/// Opens the catalog named by `pegasus.catalog.transformation` and
/// `pegasus.catalog.transformation.file`.
pub fn connect(props: &PegasusProperties, mode: OpenMode) -> Result<TransformationCatalog> {
    let format = TcFormat::select(props.transformation_catalog())?;
    Catalog::open(format, props.transformation_catalog_file(), mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pegasus_config::Properties;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_select() {
        assert_eq!(TcFormat::select("yaml").unwrap(), TcFormat::Yaml);
        let err = TcFormat::select("Database").unwrap_err();
        assert_eq!(err.module, "transformation catalog");
    }

    #[test]
    fn test_connect_and_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tc.data");
        let mut raw = Properties::new();
        raw.set("pegasus.catalog.transformation", "File");
        raw.set("pegasus.catalog.transformation.file", path.display().to_string());
        let props = PegasusProperties::resolve(raw, Some(PathBuf::from("/p"))).unwrap();

        let mut tc = connect(&props, OpenMode::Write).unwrap();
        tc.store_mut()
            .unwrap()
            .insert(TransformationEntry::new("keg", "isi", "/bin/keg"));
        tc.close().unwrap();
        assert!(tc.store().is_err());

        let tc = connect(&props, OpenMode::Read).unwrap();
        assert_eq!(tc.store().unwrap().len(), 1);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tc.text");
        std::fs::write(&path, "").unwrap();
        let mut tc = Catalog::open(TcFormat::Text, &path, OpenMode::Read).unwrap();
        assert!(tc.store_mut().is_err());
    }

    #[test]
    fn test_missing_file_for_reading() {
        let dir = TempDir::new().unwrap();
        let err = Catalog::open(TcFormat::Text, dir.path().join("nope"), OpenMode::Read).unwrap_err();
        assert!(matches!(err, crate::CatalogError::ReadFile { .. }));
    }

    #[test]
    fn test_drop_flushes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tc.yml");
        {
            let mut tc = Catalog::create(TcFormat::Yaml, &path);
            tc.store_mut()
                .unwrap()
                .insert(TransformationEntry::new("keg", "isi", "/bin/keg"));
        }
        let tc = Catalog::open(TcFormat::Yaml, &path, OpenMode::Read).unwrap();
        assert_eq!(tc.store().unwrap().list_lfns(), vec!["keg".to_string()]);
    }
}
