//! The site catalog: execution sites, their directories and gateways.

pub mod entry;
pub mod xml;
pub mod yaml;

pub use entry::{
    Directory, DirectoryType, FileServer, GridGateway, Operation, SiteEntry, SiteStore,
};
pub use xml::SchemaVersion;

use pegasus_config::{FactoryError, PegasusProperties, Registration, select};

use crate::error::Result;
use crate::handle::{Catalog, CatalogFormat, OpenMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScFormat {
    /// `sitecatalog` schema 4.0.
    Xml,
    /// `sitecatalog` schema 3.0. Only used for output; input of either
    /// version is accepted by both XML formats.
    Xml3,
    Yaml,
}

const MODULE: &str = "site catalog";

const REGISTRY: &[Registration<ScFormat>] = &[
    ("XML", ScFormat::Xml),
    ("XML4", ScFormat::Xml),
    ("XML3", ScFormat::Xml3),
    ("YAML", ScFormat::Yaml),
];

impl ScFormat {
    pub fn select(name: &str) -> std::result::Result<Self, FactoryError> {
        select(MODULE, name, REGISTRY)
    }

    pub fn name(self) -> &'static str {
        match self {
            ScFormat::Xml => "XML",
            ScFormat::Xml3 => "XML3",
            ScFormat::Yaml => "YAML",
        }
    }
}

impl CatalogFormat for ScFormat {
    type Store = SiteStore;
    const MODULE: &'static str = MODULE;

    fn load(self, text: &str, path: &str) -> Result<SiteStore> {
        let sites = match self {
            ScFormat::Xml | ScFormat::Xml3 => xml::parse(text, path)?,
            ScFormat::Yaml => yaml::parse(text)?,
        };
        let mut store = SiteStore::new();
        store.extend(sites);
        Ok(store)
    }

    fn save(self, store: &SiteStore) -> Result<String> {
        match self {
            ScFormat::Xml => Ok(xml::render(store, SchemaVersion::V4)),
            ScFormat::Xml3 => Ok(xml::render(store, SchemaVersion::V3)),
            ScFormat::Yaml => yaml::render(store),
        }
    }
}

pub type SiteCatalog = Catalog<ScFormat>;

/// Opens the catalog named by `pegasus.catalog.site` and
/// `pegasus.catalog.site.file`.
pub fn connect(props: &PegasusProperties, mode: OpenMode) -> Result<SiteCatalog> {
    let format = ScFormat::select(props.site_catalog())?;
    Catalog::open(format, props.site_catalog_file(), mode)
}
