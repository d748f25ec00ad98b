//! File-backed catalog handles.
//!
//! A [`Catalog`] owns the in-memory store of one catalog file. Writable
//! handles flush modified contents back on [`Catalog::close`], or on drop if
//! `close` was never called.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{CatalogError, Result};

/// An on-disk catalog format: how a store is read from and written to text.
pub trait CatalogFormat: Copy + fmt::Debug {
    type Store: Default;

    /// Human-readable subsystem name, used in errors.
    const MODULE: &'static str;

    fn load(self, text: &str, path: &str) -> Result<Self::Store>;

    fn save(self, store: &Self::Store) -> Result<String>;
}

/// Whether a handle may modify its backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// The file must exist.
    Read,
    /// The file is created on close if missing.
    Write,
}

pub struct Catalog<F: CatalogFormat> {
    format: F,
    path: PathBuf,
    store: F::Store,
    mode: OpenMode,
    dirty: bool,
    closed: bool,
}

impl<F: CatalogFormat> Catalog<F> {
    /// Opens the catalog at `path`.
    pub fn open(format: F, path: impl Into<PathBuf>, mode: OpenMode) -> Result<Self> {
        let path = path.into();
        let store = match std::fs::read_to_string(&path) {
            Ok(text) => format.load(&text, &path.display().to_string())?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && mode == OpenMode::Write => {
                debug!(path = %path.display(), "starting empty catalog");
                F::Store::default()
            }
            Err(e) => {
                return Err(CatalogError::ReadFile {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        debug!(module = F::MODULE, format = ?format, path = %path.display(), "opened catalog");
        Ok(Self {
            format,
            path,
            store,
            mode,
            dirty: false,
            closed: false,
        })
    }

    /// A writable handle that ignores any existing file contents.
    pub fn create(format: F, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            path: path.into(),
            store: F::Store::default(),
            mode: OpenMode::Write,
            dirty: true,
            closed: false,
        }
    }

    pub fn format(&self) -> F {
        self.format
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn store(&self) -> Result<&F::Store> {
        if self.closed {
            return Err(CatalogError::Closed(self.path.display().to_string()));
        }
        Ok(&self.store)
    }

    /// Mutable access; the catalog is written back on close.
    pub fn store_mut(&mut self) -> Result<&mut F::Store> {
        if self.closed {
            return Err(CatalogError::Closed(self.path.display().to_string()));
        }
        if self.mode == OpenMode::Read {
            return Err(CatalogError::ReadOnly(self.path.display().to_string()));
        }
        self.dirty = true;
        Ok(&mut self.store)
    }

    /// Writes pending changes and releases the handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.dirty {
            return Ok(());
        }
        let text = self.format.save(&self.store)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CatalogError::WriteFile {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, text).map_err(|e| CatalogError::WriteFile {
            path: self.path.display().to_string(),
            source: e,
        })?;
        self.dirty = false;
        debug!(module = F::MODULE, path = %self.path.display(), "flushed catalog");
        Ok(())
    }
}

impl<F: CatalogFormat> Drop for Catalog<F> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(module = F::MODULE, path = %self.path.display(), error = %e, "failed to flush catalog");
        }
    }
}

impl<F: CatalogFormat> fmt::Debug for Catalog<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("format", &self.format)
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .finish()
    }
}
