//! Abstract workflow model for the Pegasus planning toolkit.
//!
//! A DAX (DAG in XML) describes a workflow independently of where it will
//! run: jobs invoking logical transformations, the logical files they read
//! and write, and control-flow dependencies between jobs.
//!
//! - [`Adag`] is the document: files, jobs and dependency records
//! - [`Job`], [`Filename`], [`Profile`], [`Child`] and [`Leaf`] are its parts
//! - [`parser`] reads DAX XML back into the model
//!
//! Two serializations are supported: the XML document format
//! ([`Adag::write_xml`]) and the legacy brace-delimited text format
//! (the [`std::fmt::Display`] impls).

pub mod adag;
pub mod child;
pub mod error;
pub mod escape;
pub mod filename;
pub mod job;
pub mod leaf;
pub mod parser;
pub mod profile;

pub use adag::{Adag, SCHEMA_LOCATION, SCHEMA_NAMESPACE, SCHEMA_VERSION};
pub use child::Child;
pub use error::{DaxError, Result};
pub use filename::{FileType, Filename, LinkType, SHORT_LINK, SHORT_OPTIONAL, TransferMode};
pub use job::{Job, UNSET_LEVEL};
pub use leaf::{Leaf, PseudoText};
pub use parser::{AdagBuilder, DaxCallback, DocumentInfo, parse_file, parse_str, parse_with};
pub use profile::Profile;
