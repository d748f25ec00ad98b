//! Writers for executable workflows.
//!
//! The generator is picked by `pegasus.code.generator`.

pub mod condor;
pub mod shell;

use std::path::{Path, PathBuf};

use pegasus_catalog::SiteStore;
use pegasus_config::{FactoryError, Registration, select};

use crate::error::{PlannerError, Result};
use crate::workflow::ExecutableWorkflow;

pub use condor::CondorGenerator;
pub use shell::ShellGenerator;

/// Where and under which name generated files go.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorContext<'a> {
    pub submit_dir: &'a Path,
    pub basename: &'a str,
    pub sites: &'a SiteStore,
}

pub trait CodeGenerator {
    /// Writes the workflow; returns the files written, main file first.
    fn generate(&self, workflow: &ExecutableWorkflow, ctx: &GeneratorContext<'_>) -> Result<Vec<PathBuf>>;

    /// The file a workflow manager is pointed at.
    fn main_file(&self, ctx: &GeneratorContext<'_>) -> PathBuf;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Condor,
    Shell,
}

const MODULE: &str = "code generator";

const REGISTRY: &[Registration<GeneratorKind>] = &[
    ("Condor", GeneratorKind::Condor),
    ("Shell", GeneratorKind::Shell),
];

impl GeneratorKind {
    pub fn select(name: &str) -> std::result::Result<Self, FactoryError> {
        select(MODULE, name, REGISTRY)
    }

    pub fn generator(self) -> Box<dyn CodeGenerator> {
        match self {
            GeneratorKind::Condor => Box::new(CondorGenerator),
            GeneratorKind::Shell => Box::new(ShellGenerator),
        }
    }
}

pub(crate) fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| PlannerError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Quotes `s` for a POSIX shell when it contains anything but safe characters.
pub(crate) fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '=' | ',' | '+'));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select() {
        assert_eq!(GeneratorKind::select("condor").unwrap(), GeneratorKind::Condor);
        assert_eq!(GeneratorKind::select("SHELL").unwrap(), GeneratorKind::Shell);
        let err = GeneratorKind::select("DAGLite").unwrap_err();
        assert_eq!(err.module, "code generator");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/bin/echo"), "/bin/echo");
        assert_eq!(shell_quote("two words"), "'two words'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
