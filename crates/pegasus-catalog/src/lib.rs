//! Catalogs consulted while planning a Pegasus workflow.
//!
//! - [`transformation`]: where executables for logical transformations live
//! - [`replica`]: physical copies of logical files
//! - [`site`]: execution sites, their storage and job gateways
//!
//! Each catalog is a plain in-memory store plus a set of on-disk formats.
//! A [`Catalog`] handle ties a store to a file and writes it back on close.
//! Formats are picked by property value through [`pegasus_config::select`].

pub mod common;
pub mod error;
pub mod handle;
pub mod replica;
pub mod site;
pub mod transformation;

pub use common::{Arch, CatalogProfile, Os, SysInfo};
pub use error::{CatalogError, Result};
pub use handle::{Catalog, CatalogFormat, OpenMode};
pub use replica::{RcFormat, ReplicaCatalog, ReplicaEntry, ReplicaStore};
pub use site::{ScFormat, SiteCatalog, SiteEntry, SiteStore};
pub use transformation::{TcFormat, TcType, TransformationCatalog, TransformationEntry, TransformationStore};
