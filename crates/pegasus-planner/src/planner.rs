//! One planner run, from DAX to submit directory.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};

use pegasus_catalog::{OpenMode, SiteStore, site, transformation};
use pegasus_config::PegasusProperties;
use pegasus_dax::Adag;

use crate::codegen::{GeneratorContext, GeneratorKind};
use crate::engine::{PlanningContext, RefinementEngine, SiteSelectingEngine};
use crate::error::{PlannerError, Result};
use crate::options::{PlannerOptions, RandomDir};
use crate::rescue::{dag_filename, should_submit_rescue};
use crate::submit::{display_invocation, pegasus_run_arguments, submit};
use crate::submit_dir::{
    create_submit_directory, current_user, is_non_empty, random_directory_name, sanity_check,
};
use crate::workflow::{ExecutableJob, ExecutableWorkflow, JobKind};

/// Subdirectory of the submit directory holding the cleanup workflow.
pub const CLEANUP_DIR: &str = "cleanup";

pub const SUCCESS_MESSAGE: &str = "I have concretized your abstract workflow. The workflow has been entered \n\
into the workflow database with a state of \"planned\". The next step is \n\
to start or execute your workflow. The invocation required is";

/// What a planner run produced.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub submit_dir: PathBuf,
    pub properties_file: PathBuf,
    /// Generated files, main file first.
    pub files: Vec<PathBuf>,
    /// Planning was skipped in favour of resubmitting a rescue dag.
    pub rescue: bool,
    /// The DAX had no jobs and a NOOP job was planned instead.
    pub empty: bool,
    pub cleanup_files: Vec<PathBuf>,
    /// Arguments to `pegasus-run`.
    pub run_arguments: Vec<String>,
    pub submitted: bool,
}

impl PlanOutcome {
    pub fn invocation(&self) -> String {
        display_invocation(&self.run_arguments)
    }
}

/// Plans the DAX named in `options`.
pub async fn plan(props: &PegasusProperties, options: &PlannerOptions) -> Result<PlanOutcome> {
    let dax = pegasus_dax::parse_file(&options.dax)?;
    info!(label = dax.label(), index = dax.index(), jobs = dax.job_count(), "parsed dax");
    let now = Local::now();
    let basename = options.file_basename(dax.label(), dax.index());

    // ── Submit directory ────────────────────────────────────────────────────

    let relative_submit = match (&options.relative_submit_dir, &options.relative_dir) {
        (Some(dir), _) | (None, Some(dir)) => PathBuf::from(dir),
        (None, None) => {
            let vogroup = options.vogroup.as_deref().unwrap_or(props.vogroup());
            create_submit_directory(
                &options.base_dir,
                &current_user(),
                vogroup,
                dax.label(),
                props.submit_dir_mode(),
                &now,
            )?
        }
    };
    let submit_dir = options.base_dir.join(&relative_submit);
    sanity_check(&submit_dir)?;
    if !options.force && options.rescue_tries == 0 && is_non_empty(&submit_dir) {
        return Err(PlannerError::Directory {
            path: submit_dir.display().to_string(),
            message: "directory is not empty; use --force to plan into it anyway".to_string(),
        });
    }
    debug!(path = %submit_dir.display(), "submit directory");

    let dag = dag_filename(&basename);
    if should_submit_rescue(&submit_dir, &dag, options.rescue_tries) {
        info!(dag = %dag, "no planning attempted, rescue dag will be submitted");
        let properties_file = props.write_out(&submit_dir)?;
        let run_arguments = pegasus_run_arguments(&properties_file, &options.forward, &submit_dir);
        let mut outcome = PlanOutcome {
            files: vec![submit_dir.join(&dag)],
            submit_dir,
            properties_file,
            rescue: true,
            empty: false,
            cleanup_files: Vec::new(),
            run_arguments,
            submitted: false,
        };
        if options.submit {
            submit(&props.bin_dir(), &outcome.run_arguments).await?;
            outcome.submitted = true;
        }
        return Ok(outcome);
    }

    let remote_dir = match &options.random_dir {
        RandomDir::Generated => Some(random_directory_name(
            dax.label(),
            dax.index(),
            options.basename.as_deref(),
            &now,
        )),
        RandomDir::Named(name) => Some(name.clone()),
        RandomDir::Off => Some(
            options
                .relative_dir
                .clone()
                .unwrap_or_else(|| relative_submit.display().to_string()),
        ),
    };

    // ── Catalogs ────────────────────────────────────────────────────────────

    let mut sc = site::connect(props, OpenMode::Read)?;
    let mut tc = transformation::connect(props, OpenMode::Read)?;
    let sites = sc.store()?;
    let candidates = candidate_sites(sites, &options.sites)?;
    if let Some(output) = &options.output_site
        && !sites.contains(output)
    {
        return Err(PlannerError::UnknownSite(output.clone()));
    }
    if let Some(dir) = &options.output_dir {
        debug!(dir = %dir.display(), "output directory");
    }
    if !options.cluster.is_empty() {
        warn!(techniques = %options.cluster.join(","), "job clustering is not supported, ignoring");
    }
    debug!(sites = %candidates.join(","), "execution sites");

    // ── Refinement ──────────────────────────────────────────────────────────

    let ctx = PlanningContext {
        transformations: tc.store()?,
        sites,
        candidates: &candidates,
        job_prefix: options.job_prefix.as_deref(),
        remote_dir: remote_dir.as_deref(),
    };
    let engine = SiteSelectingEngine;
    debug!(engine = engine.name(), "refining workflow");
    let mut workflow = engine.refine(&dax, &ctx)?;
    let empty = workflow.is_empty();
    if empty {
        debug!("adding a noop job to the empty workflow");
        workflow.add_job(ExecutableJob::noop(dax.label(), dax.index()));
    }

    // ── Code generation ─────────────────────────────────────────────────────

    // Nothing is written to the submit directory before this point.
    let generator = GeneratorKind::select(props.code_generator())?.generator();
    copy_dax(&options.dax, &submit_dir);
    let properties_file = props.write_out(&submit_dir)?;
    let run_arguments = pegasus_run_arguments(&properties_file, &options.forward, &submit_dir);
    let gen_ctx = GeneratorContext {
        submit_dir: &submit_dir,
        basename: &basename,
        sites,
    };
    info!("generating codes for the executable workflow");
    let files = generator.generate(&workflow, &gen_ctx)?;

    let mut cleanup_files = Vec::new();
    if options.random_dir != RandomDir::Off && options.cleanup && !empty {
        let cleanup = cleanup_workflow(&dax, &workflow, sites, remote_dir.as_deref().unwrap_or_default());
        if !cleanup.is_empty() {
            let cleanup_dir = submit_dir.join(CLEANUP_DIR);
            sanity_check(&cleanup_dir)?;
            info!("generating code for the cleanup workflow");
            cleanup_files = generator.generate(
                &cleanup,
                &GeneratorContext {
                    submit_dir: &cleanup_dir,
                    basename: &basename,
                    sites,
                },
            )?;
        }
    }

    sc.close()?;
    tc.close()?;

    let mut outcome = PlanOutcome {
        submit_dir,
        properties_file,
        files,
        rescue: false,
        empty,
        cleanup_files,
        run_arguments,
        submitted: false,
    };
    if options.submit {
        submit(&props.bin_dir(), &outcome.run_arguments).await?;
        outcome.submitted = true;
    }
    Ok(outcome)
}

/// The requested sites, or every catalog site when none were requested.
fn candidate_sites(sites: &SiteStore, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(sites.handles().map(String::from).collect());
    }
    match requested.iter().find(|s| !sites.contains(s)) {
        Some(missing) => Err(PlannerError::UnknownSite(missing.clone())),
        None => Ok(requested.to_vec()),
    }
}

fn copy_dax(dax: &Path, submit_dir: &Path) {
    let Some(name) = dax.file_name() else {
        return;
    };
    let target = submit_dir.join(name);
    if let Err(e) = std::fs::copy(dax, &target) {
        warn!(error = %e, target = %target.display(), "unable to copy dax into the submit directory");
    }
}

/// One job per used site removing the workflow's remote directory.
fn cleanup_workflow(
    dax: &Adag,
    workflow: &ExecutableWorkflow,
    sites: &SiteStore,
    remote_dir: &str,
) -> ExecutableWorkflow {
    let mut cleanup = ExecutableWorkflow::new(format!("{}_cleanup", dax.label()), dax.index());
    for handle in workflow.sites() {
        let Some(scratch) = sites.lookup(handle).and_then(|s| s.scratch_path()) else {
            debug!(site = handle, "no scratch directory, nothing to clean up");
            continue;
        };
        let id = format!("cleanup_{handle}");
        let mut job = ExecutableJob::new(id.clone(), id, handle, "/bin/rm");
        job.transformation = "pegasus::cleanup:1.0".to_string();
        job.arguments = format!("-rf {}/{}", scratch.trim_end_matches('/'), remote_dir);
        job.kind = JobKind::Cleanup;
        cleanup.add_job(job);
    }
    cleanup
}

#[cfg(test)]
mod tests {
    use super::*;
    use pegasus_catalog::SiteEntry;
    use pegasus_catalog::site::{Directory, DirectoryType};

    #[test]
    fn test_candidate_sites() {
        let mut sites = SiteStore::new();
        sites.insert(SiteEntry::new("local"));
        sites.insert(SiteEntry::new("isi"));
        assert_eq!(candidate_sites(&sites, &[]).unwrap(), vec!["isi", "local"]);
        assert_eq!(candidate_sites(&sites, &["local".to_string()]).unwrap(), vec!["local"]);
        assert!(matches!(
            candidate_sites(&sites, &["nowhere".to_string()]),
            Err(PlannerError::UnknownSite(s)) if s == "nowhere"
        ));
    }

    #[test]
    fn test_cleanup_workflow() {
        let mut sites = SiteStore::new();
        let mut isi = SiteEntry::new("isi");
        isi.directories.push(Directory::new(DirectoryType::SharedScratch, "/scratch/"));
        sites.insert(isi);
        sites.insert(SiteEntry::new("local"));

        let mut wf = ExecutableWorkflow::new("w", 0);
        wf.add_job(ExecutableJob::new("a", "a", "isi", "/bin/a"));
        wf.add_job(ExecutableJob::new("b", "b", "local", "/bin/b"));

        let cleanup = cleanup_workflow(&Adag::with_name("w"), &wf, &sites, "w-0-x");
        assert_eq!(cleanup.len(), 1);
        let job = cleanup.job("cleanup_isi").unwrap();
        assert_eq!(job.arguments, "-rf /scratch/w-0-x");
        assert_eq!(job.kind, JobKind::Cleanup);
    }
}
