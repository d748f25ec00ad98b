//! Ranking alternative DAXes by estimated runtime.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use pegasus_catalog::TransformationStore;
use pegasus_dax::{Adag, Job};

use crate::error::{PlannerError, Result};

pub const RUNTIME_NAMESPACE: &str = "pegasus";
pub const RUNTIME_KEY: &str = "runtime";

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub dax: PathBuf,
    pub label: String,
    /// Length of the critical path.
    pub runtime: f64,
}

/// Sites a DAX must be runnable on.
#[derive(Debug, Clone, Copy)]
pub struct SiteFilter<'a> {
    pub transformations: &'a TransformationStore,
    pub sites: &'a [String],
}

impl SiteFilter<'_> {
    /// Whether every job's transformation is installed on one of the sites.
    pub fn accepts(&self, dax: &Adag) -> bool {
        dax.jobs().all(|job| {
            self.sites.iter().any(|site| {
                !self
                    .transformations
                    .lookup(job.namespace(), job.name(), job.version(), Some(site.as_str()), None)
                    .is_empty()
            })
        })
    }
}

/// Estimated runtime of a job from its `pegasus::runtime` profile, default 1.
pub fn job_runtime(job: &Job) -> f64 {
    let Some(profile) = job.profile(RUNTIME_NAMESPACE, RUNTIME_KEY) else {
        return 1.0;
    };
    let value = profile.value();
    match value.trim().parse::<f64>() {
        Ok(v) if v >= 0.0 => v,
        _ => {
            warn!(job = job.id(), value = %value, "unusable runtime estimate, assuming 1");
            1.0
        }
    }
}

/// Weight of the heaviest dependency chain in `dax`.
pub fn critical_path(dax: &Adag) -> Result<f64> {
    let mut parents: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for child in dax.children() {
        parents
            .entry(child.child().to_string())
            .or_default()
            .extend(child.parents().filter(|p| dax.job(p).is_some()).map(String::from));
    }

    let mut finish: BTreeMap<String, f64> = BTreeMap::new();
    let mut pending: Vec<&Job> = dax.jobs().collect();
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|job| {
            let deps = parents.get(job.id()).map(Vec::as_slice).unwrap_or_default();
            let start = deps
                .iter()
                .map(|p| finish.get(p.as_str()).copied())
                .try_fold(0.0_f64, |max, f| f.map(|f| max.max(f)));
            match start {
                Some(start) => {
                    finish.insert(job.id().to_string(), start + job_runtime(job));
                    false
                }
                None => true,
            }
        });
        if pending.len() == before {
            return Err(PlannerError::Cycle(pending[0].id().to_string()));
        }
    }
    Ok(finish.values().copied().fold(0.0, f64::max))
}

/// Ranks every `*.dax` file in `dir`, fastest first. Files that fail to
/// parse or contain a dependency cycle are skipped with a warning.
pub fn rank_directory(dir: &Path, filter: Option<SiteFilter<'_>>, best: Option<usize>) -> Result<Vec<Ranking>> {
    let pattern = dir.join("*.dax");
    let paths = glob::glob(&pattern.to_string_lossy())
        .map_err(|e| PlannerError::InvalidOption(format!("bad dax pattern: {e}")))?;

    let mut rankings = Vec::new();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "skipping unreadable path");
                continue;
            }
        };
        let dax = match pegasus_dax::parse_file(&path) {
            Ok(dax) => dax,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unparsable dax");
                continue;
            }
        };
        if let Some(filter) = &filter
            && !filter.accepts(&dax)
        {
            debug!(path = %path.display(), "not runnable on the requested sites");
            continue;
        }
        let runtime = match critical_path(&dax) {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping cyclic dax");
                continue;
            }
        };
        debug!(path = %path.display(), runtime, "ranked dax");
        rankings.push(Ranking {
            label: dax.label().to_string(),
            dax: path,
            runtime,
        });
    }

    rankings.sort_by(|a, b| a.runtime.total_cmp(&b.runtime).then_with(|| a.dax.cmp(&b.dax)));
    if let Some(n) = best {
        rankings.truncate(n);
    }
    Ok(rankings)
}

/// One `rank<TAB>runtime<TAB>path` line per ranking.
pub fn render(rankings: &[Ranking]) -> String {
    let mut out = String::new();
    for (i, r) in rankings.iter().enumerate() {
        let _ = writeln!(out, "{}\t{}\t{}", i + 1, r.runtime, r.dax.display());
    }
    out
}
