//! Refinement: turning an abstract workflow into an executable one.

use tracing::{debug, warn};

use pegasus_catalog::common::upsert_profile;
use pegasus_catalog::{CatalogProfile, SiteStore, TransformationStore};
use pegasus_dax::{Adag, Job};

use crate::error::{PlannerError, Result};
use crate::workflow::{ExecutableJob, ExecutableWorkflow};

/// What a refinement engine may consult.
#[derive(Debug, Clone, Copy)]
pub struct PlanningContext<'a> {
    pub transformations: &'a TransformationStore,
    pub sites: &'a SiteStore,
    /// Candidate execution sites, in preference order.
    pub candidates: &'a [String],
    /// Prefix for generated job names.
    pub job_prefix: Option<&'a str>,
    /// Directory name below each site's scratch space.
    pub remote_dir: Option<&'a str>,
}

pub trait RefinementEngine {
    fn name(&self) -> &'static str;

    fn refine(&self, dax: &Adag, ctx: &PlanningContext<'_>) -> Result<ExecutableWorkflow>;
}

/// Places each job on a candidate site that has its transformation.
///
/// Candidates are tried round robin, starting one further for every job,
/// so independent jobs spread across equally capable sites.
#[derive(Debug, Default, Clone, Copy)]
pub struct SiteSelectingEngine;

impl SiteSelectingEngine {
    fn map_job(&self, ordinal: usize, job: &Job, ctx: &PlanningContext<'_>) -> Result<ExecutableJob> {
        let n = ctx.candidates.len();
        if n == 0 {
            return Err(PlannerError::NoSites);
        }

        for offset in 0..n {
            let site = &ctx.candidates[(ordinal + offset) % n];
            let entries = ctx.transformations.lookup(
                job.namespace(),
                job.name(),
                job.version(),
                Some(site.as_str()),
                None,
            );
            let Some(entry) = entries.first() else {
                continue;
            };

            let mut mapped = ExecutableJob::new(
                job.id(),
                submit_name(ctx.job_prefix, job),
                site.clone(),
                entry.pfn.clone(),
            );
            mapped.transformation = job.transformation();
            mapped.arguments = job.argument_line().trim().to_string();
            mapped.stdin = job.stdin().map(|f| f.name().to_string());
            mapped.stdout = job.stdout().map(|f| f.name().to_string());
            mapped.stderr = job.stderr().map(|f| f.name().to_string());

            // lowest to highest precedence: DAX, site catalog, transformation catalog
            for profile in job.profiles() {
                if let (Some(ns), Some(key)) = (profile.namespace(), profile.key()) {
                    upsert_profile(&mut mapped.profiles, CatalogProfile::new(ns, key, profile.value()));
                }
            }
            if let Some(site_entry) = ctx.sites.lookup(site) {
                for profile in &site_entry.profiles {
                    upsert_profile(&mut mapped.profiles, profile.clone());
                }
                if let (Some(scratch), Some(dir)) = (site_entry.scratch_path(), ctx.remote_dir) {
                    mapped.working_dir = Some(format!("{}/{}", scratch.trim_end_matches('/'), dir));
                }
            }
            for profile in &entry.profiles {
                upsert_profile(&mut mapped.profiles, profile.clone());
            }

            debug!(job = job.id(), site = %site, pfn = %entry.pfn, "mapped job");
            return Ok(mapped);
        }

        Err(PlannerError::Unmapped {
            job: job.id().to_string(),
            transformation: job.transformation(),
            sites: ctx.candidates.join(","),
        })
    }
}

impl RefinementEngine for SiteSelectingEngine {
    fn name(&self) -> &'static str {
        "site-selecting"
    }

    fn refine(&self, dax: &Adag, ctx: &PlanningContext<'_>) -> Result<ExecutableWorkflow> {
        let mut workflow = ExecutableWorkflow::new(dax.label(), dax.index());
        workflow.count = dax.count();
        workflow.remote_dir = ctx.remote_dir.map(String::from);

        for (ordinal, job) in dax.jobs().enumerate() {
            workflow.add_job(self.map_job(ordinal, job, ctx)?);
        }
        for child in dax.children() {
            for parent in child.parents() {
                if workflow.job(child.child()).is_none() || workflow.job(parent).is_none() {
                    warn!(child = child.child(), parent, "dependency refers to an unknown job");
                    continue;
                }
                workflow.add_edge(child.child(), parent);
            }
        }
        Ok(workflow)
    }
}

/// `[prefix]name_id` with characters unsafe in file names replaced.
fn submit_name(prefix: Option<&str>, job: &Job) -> String {
    let raw = format!("{}{}_{}", prefix.unwrap_or(""), job.name(), job.id());
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
        .collect()
}
