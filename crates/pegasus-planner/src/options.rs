//! Options controlling one planner run.

use std::path::PathBuf;

use crate::error::{PlannerError, Result};

/// How the remote execution directory is named.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RandomDir {
    /// Reuse the relative submit directory.
    #[default]
    Off,
    /// `-r` without a value: derive a name from the workflow.
    Generated,
    /// `-r NAME`.
    Named(String),
}

/// An option forwarded to `pegasus-run` as `--key [value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardOption {
    pub key: String,
    pub value: Option<String>,
}

impl ForwardOption {
    /// Parses `option[=value]`; leading dashes are dropped.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim_start_matches('-');
        let (key, value) = match raw.split_once('=') {
            Some((k, v)) => (k, Some(v.to_string())),
            None => (raw, None),
        };
        if key.is_empty() {
            return Err(PlannerError::InvalidOption(format!(
                "forward option '{raw}' has no name"
            )));
        }
        Ok(Self {
            key: key.to_string(),
            value,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PlannerOptions {
    pub dax: PathBuf,
    /// Candidate execution sites; empty means every site in the catalog.
    pub sites: Vec<String>,
    pub output_site: Option<String>,
    pub output_dir: Option<PathBuf>,
    /// Base of the submit directory tree.
    pub base_dir: PathBuf,
    /// Remote directory name relative to each site's scratch space.
    pub relative_dir: Option<String>,
    /// Submit directory relative to `base_dir`, used as is.
    pub relative_submit_dir: Option<String>,
    pub force: bool,
    pub submit: bool,
    /// Requested clustering techniques. Recorded only.
    pub cluster: Vec<String>,
    pub random_dir: RandomDir,
    pub basename: Option<String>,
    pub vogroup: Option<String>,
    pub job_prefix: Option<String>,
    pub cleanup: bool,
    pub forward: Vec<ForwardOption>,
    /// Number of rescue dags to try before planning again; 0 disables.
    pub rescue_tries: u32,
}

impl PlannerOptions {
    pub fn new(dax: impl Into<PathBuf>) -> Self {
        Self {
            dax: dax.into(),
            sites: Vec::new(),
            output_site: None,
            output_dir: None,
            base_dir: PathBuf::from("."),
            relative_dir: None,
            relative_submit_dir: None,
            force: false,
            submit: false,
            cluster: Vec::new(),
            random_dir: RandomDir::Off,
            basename: None,
            vogroup: None,
            job_prefix: None,
            cleanup: true,
            forward: Vec::new(),
            rescue_tries: 0,
        }
    }

    /// Basename of generated files: `--basename`, else `label-index`.
    pub fn file_basename(&self, label: &str, index: u32) -> String {
        match &self.basename {
            Some(b) => b.clone(),
            None => format!("{label}-{index}"),
        }
    }
}

/// Splits comma-separated values, dropping empty items.
pub fn split_list<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.as_ref().split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
