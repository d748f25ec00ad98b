//! pegasus-dax-validator: checks a DAX for problems that would stop planning.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Parser;
use tracing::{error, info, warn};

use pegasus_dax::Adag;
use pegasus_planner::partition::bfs_levels;

use super::Context;
use crate::cli::{GlobalArgs, Tool};

/// Validate a DAX file
#[derive(Parser, Debug)]
#[command(name = "pegasus-dax-validator", author, version, about, long_about = None)]
pub struct ValidatorArgs {
    /// The DAX file to validate
    #[arg(value_name = "DAX")]
    pub dax: PathBuf,

    #[command(flatten)]
    pub globals: GlobalArgs,
}

impl Tool for ValidatorArgs {
    const NAME: &'static str = "pegasus-dax-validator";

    fn globals(&self) -> GlobalArgs {
        self.globals.clone()
    }
}

/// Findings by severity. A fatal error means the document could not be read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub fatals: Vec<String>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.fatals.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} warnings, {} errors, and {} fatal errors detected.",
            self.warnings.len(),
            self.errors.len(),
            self.fatals.len()
        )
    }
}

/// Structural checks on a parsed workflow.
pub fn check(dax: &Adag) -> Report {
    let mut report = Report::default();
    for id in dax.dangling_references() {
        report.warnings.push(format!("dependency names unknown job '{id}'"));
    }
    if let Err(e) = bfs_levels(dax) {
        report.errors.push(e.to_string());
    }
    report
}

pub fn validate(path: &Path) -> (Option<Adag>, Report) {
    match pegasus_dax::parse_file(path) {
        Ok(dax) => {
            let report = check(&dax);
            (Some(dax), report)
        }
        Err(e) => (
            None,
            Report {
                fatals: vec![e.to_string()],
                ..Default::default()
            },
        ),
    }
}

/// Run pegasus-dax-validator.
pub fn run(args: ValidatorArgs, _ctx: &Context) -> Result<()> {
    let (dax, report) = validate(&args.dax);
    for w in &report.warnings {
        warn!("{w}");
    }
    for e in report.errors.iter().chain(&report.fatals) {
        error!("{e}");
    }
    if let Some(dax) = &dax {
        info!(label = dax.label(), "parsed dax");
        println!(
            "{}: {} jobs, {} files, {} dependencies",
            args.dax.display(),
            dax.job_count(),
            dax.file_count(),
            dax.child_count()
        );
    }
    println!("{report}");
    if !report.is_clean() {
        bail!("{} is not a valid DAX", args.dax.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pegasus_dax::Job;
    use tempfile::TempDir;

    #[test]
    fn test_clean_dax() {
        let mut dag = Adag::with_name("ok");
        dag.add_job(Job::new("ID1", "a"));
        dag.add_job(Job::new("ID2", "b"));
        dag.add_child_edge("ID2", "ID1");
        let report = check(&dag);
        assert!(report.is_clean());
        assert_eq!(report.to_string(), "0 warnings, 0 errors, and 0 fatal errors detected.");
    }

    #[test]
    fn test_cycle_is_an_error() {
        let mut dag = Adag::with_name("loop");
        dag.add_job(Job::new("ID1", "a"));
        dag.add_job(Job::new("ID2", "b"));
        dag.add_child_edge("ID2", "ID1");
        dag.add_child_edge("ID1", "ID2");
        let report = check(&dag);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_dangling_reference_warns() {
        let mut dag = Adag::with_name("dangling");
        dag.add_job(Job::new("ID1", "a"));
        dag.add_child_edge("ID1", "ID9");
        let report = check(&dag);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.is_clean());
    }

    #[test]
    fn test_unparsable_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.dax");
        std::fs::write(&path, "<adag><job id=\"x\"></adag>").unwrap();
        let (dax, report) = validate(&path);
        assert!(dax.is_none());
        assert_eq!(report.fatals.len(), 1);
    }
}
