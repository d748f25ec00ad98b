//! Condor DAGMan output: one `.dag`, one `.sub` per job and a `.dot` graph.

use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::debug;

use super::{CodeGenerator, GeneratorContext, write_file};
use crate::error::Result;
use crate::workflow::{ExecutableJob, ExecutableWorkflow, JobKind};

const SEPARATOR: &str = "######################################################################";

#[derive(Debug, Default, Clone, Copy)]
pub struct CondorGenerator;

impl CodeGenerator for CondorGenerator {
    fn generate(&self, workflow: &ExecutableWorkflow, ctx: &GeneratorContext<'_>) -> Result<Vec<PathBuf>> {
        let dag_path = self.main_file(ctx);
        write_file(&dag_path, &render_dag(workflow))?;
        let mut written = vec![dag_path];

        for job in workflow.jobs() {
            let path = ctx.submit_dir.join(format!("{}.sub", job.name));
            write_file(&path, &render_submit(workflow, job, ctx))?;
            written.push(path);
        }

        let dot = ctx.submit_dir.join(format!("{}.dot", ctx.basename));
        write_file(&dot, &render_dot(workflow))?;
        written.push(dot);

        debug!(files = written.len(), dir = %ctx.submit_dir.display(), "wrote condor workflow");
        Ok(written)
    }

    fn main_file(&self, ctx: &GeneratorContext<'_>) -> PathBuf {
        ctx.submit_dir.join(format!("{}.dag", ctx.basename))
    }
}

pub fn render_dag(workflow: &ExecutableWorkflow) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{SEPARATOR}");
    let _ = writeln!(out, "# PEGASUS GENERATED SUBMIT FILE");
    let _ = writeln!(out, "# DAG {}", workflow.label);
    let _ = writeln!(out, "# Index = {}, Count = {}", workflow.index, workflow.count);
    let _ = writeln!(out, "{SEPARATOR}");

    for job in workflow.jobs() {
        let noop = if job.kind == JobKind::Noop { " NOOP" } else { "" };
        let _ = writeln!(out, "JOB {} {}.sub{}", job.name, job.name, noop);
        if let Some(retry) = job.profiles_in("dagman").find(|p| p.key.eq_ignore_ascii_case("retry")) {
            let _ = writeln!(out, "RETRY {} {}", job.name, retry.value);
        }
    }
    for (parent, child) in workflow.edges() {
        if let (Some(p), Some(c)) = (workflow.job(parent), workflow.job(child)) {
            let _ = writeln!(out, "PARENT {} CHILD {}", p.name, c.name);
        }
    }

    let _ = writeln!(out, "{SEPARATOR}");
    let _ = writeln!(out, "# End of DAG");
    let _ = writeln!(out, "{SEPARATOR}");
    out
}

pub fn render_submit(workflow: &ExecutableWorkflow, job: &ExecutableJob, ctx: &GeneratorContext<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{SEPARATOR}");
    let _ = writeln!(out, "# PEGASUS GENERATED SUBMIT FILE");
    let _ = writeln!(
        out,
        "# DAG : {}, Index = {}, Count = {}",
        workflow.label, workflow.index, workflow.count
    );
    let _ = writeln!(out, "# SUBMIT FILE NAME : {}.sub", job.name);
    let _ = writeln!(out, "{SEPARATOR}");

    let gateway = ctx.sites.lookup(&job.site).and_then(|site| {
        site.grids
            .iter()
            .find(|g| g.job_type.as_deref().is_none_or(|t| t.eq_ignore_ascii_case("compute")))
    });
    match gateway {
        Some(grid) if job.kind == JobKind::Compute => {
            let _ = writeln!(out, "universe = grid");
            let _ = writeln!(out, "grid_resource = {} {}", grid.grid_type, grid.contact);
        }
        _ => {
            let _ = writeln!(out, "universe = vanilla");
        }
    }
    let _ = writeln!(out, "executable = {}", job.executable);
    if !job.arguments.is_empty() {
        let _ = writeln!(out, "arguments = \"{}\"", job.arguments.replace('"', "\"\""));
    }
    if let Some(dir) = &job.working_dir {
        let _ = writeln!(out, "remote_initialdir = {dir}");
    }

    let env: Vec<String> = job
        .profiles_in("env")
        .map(|p| format!("{}={}", p.key, p.value.replace('"', "\"\"")))
        .collect();
    if !env.is_empty() {
        let _ = writeln!(out, "environment = \"{}\"", env.join(" "));
    }

    if let Some(stdin) = &job.stdin {
        let _ = writeln!(out, "input = {stdin}");
    }
    let stdout = job.stdout.clone().unwrap_or_else(|| format!("{}.out", job.name));
    let stderr = job.stderr.clone().unwrap_or_else(|| format!("{}.err", job.name));
    let _ = writeln!(out, "output = {stdout}");
    let _ = writeln!(out, "error = {stderr}");
    let _ = writeln!(out, "log = {}.log", ctx.basename);
    let _ = writeln!(out, "notification = NEVER");
    for p in job.profiles_in("condor") {
        let _ = writeln!(out, "{} = {}", p.key, p.value);
    }
    let _ = writeln!(out, "+pegasus_site = \"{}\"", job.site);
    let _ = writeln!(out, "+pegasus_wf_xformation = \"{}\"", job.transformation);
    let _ = writeln!(out, "+pegasus_wf_dax_job_id = \"{}\"", job.id);

    let _ = writeln!(out, "queue");
    let _ = writeln!(out, "{SEPARATOR}");
    let _ = writeln!(out, "# END OF SUBMIT FILE");
    let _ = writeln!(out, "{SEPARATOR}");
    out
}

pub fn render_dot(workflow: &ExecutableWorkflow) -> String {
    let mut out = String::from("digraph E {\nsize=\"8.0,10.0\"\nratio=fill\nnode [shape=ellipse]\nedge [arrowhead=normal, arrowsize=1.0]\n");
    for job in workflow.jobs() {
        let _ = writeln!(out, "\t\"{}\" [color=blue,style=filled,label=\"{}\"]", job.name, job.name);
    }
    for (parent, child) in workflow.edges() {
        if let (Some(p), Some(c)) = (workflow.job(parent), workflow.job(child)) {
            let _ = writeln!(out, "\t\"{}\" -> \"{}\"", p.name, c.name);
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pegasus_catalog::site::GridGateway;
    use pegasus_catalog::{CatalogProfile, SiteEntry, SiteStore};
    use tempfile::TempDir;

    fn workflow() -> ExecutableWorkflow {
        let mut wf = ExecutableWorkflow::new("diamond", 0);
        let mut a = ExecutableJob::new("ID1", "preprocess_ID1", "isi", "/bin/preprocess");
        a.arguments = "-i \"f.a\"".to_string();
        a.profiles.push(CatalogProfile::new("env", "HOME", "/home/p"));
        a.profiles.push(CatalogProfile::new("dagman", "RETRY", "3"));
        a.profiles.push(CatalogProfile::new("condor", "priority", "10"));
        let mut b = ExecutableJob::new("ID2", "analyze_ID2", "local", "/bin/analyze");
        b.working_dir = Some("/scratch/run0001".to_string());
        b.stdout = Some("result.txt".to_string());
        wf.add_job(a);
        wf.add_job(b);
        wf.add_edge("ID2", "ID1");
        wf
    }

    fn sites() -> SiteStore {
        let mut store = SiteStore::new();
        let mut isi = SiteEntry::new("isi");
        isi.grids.push(GridGateway {
            grid_type: "gt5".into(),
            contact: "smarty.isi.edu/jobmanager-fork".into(),
            scheduler: "Fork".into(),
            job_type: Some("auxillary".into()),
        });
        isi.grids.push(GridGateway {
            grid_type: "gt5".into(),
            contact: "smarty.isi.edu/jobmanager-pbs".into(),
            scheduler: "PBS".into(),
            job_type: Some("compute".into()),
        });
        store.insert(isi);
        store
    }

    #[test]
    fn test_dag_lists_jobs_and_edges() {
        let dag = render_dag(&workflow());
        assert!(dag.contains("# DAG diamond\n# Index = 0, Count = 1\n"));
        assert!(dag.contains("JOB preprocess_ID1 preprocess_ID1.sub\n"));
        assert!(dag.contains("RETRY preprocess_ID1 3\n"));
        assert!(dag.contains("PARENT preprocess_ID1 CHILD analyze_ID2\n"));
        assert!(dag.ends_with("# End of DAG\n######################################################################\n"));
    }

    #[test]
    fn test_submit_files() {
        let dir = TempDir::new().unwrap();
        let sites = sites();
        let ctx = GeneratorContext {
            submit_dir: dir.path(),
            basename: "diamond-0",
            sites: &sites,
        };
        let wf = workflow();

        let grid = render_submit(&wf, wf.job("ID1").unwrap(), &ctx);
        assert!(grid.contains("universe = grid\ngrid_resource = gt5 smarty.isi.edu/jobmanager-pbs\n"));
        assert!(grid.contains("arguments = \"-i \"\"f.a\"\"\"\n"));
        assert!(grid.contains("environment = \"HOME=/home/p\"\n"));
        assert!(grid.contains("priority = 10\n"));
        assert!(grid.contains("log = diamond-0.log\n"));

        let local = render_submit(&wf, wf.job("ID2").unwrap(), &ctx);
        assert!(local.contains("universe = vanilla\n"));
        assert!(local.contains("remote_initialdir = /scratch/run0001\n"));
        assert!(local.contains("output = result.txt\n"));
        assert!(local.contains("error = analyze_ID2.err\n"));
    }

    #[test]
    fn test_generate_writes_all_files() {
        let dir = TempDir::new().unwrap();
        let sites = SiteStore::new();
        let ctx = GeneratorContext {
            submit_dir: dir.path(),
            basename: "diamond-0",
            sites: &sites,
        };
        let files = CondorGenerator.generate(&workflow(), &ctx).unwrap();
        assert_eq!(files[0], dir.path().join("diamond-0.dag"));
        assert_eq!(files.len(), 4);
        assert!(dir.path().join("analyze_ID2.sub").exists());
        let dot = std::fs::read_to_string(dir.path().join("diamond-0.dot")).unwrap();
        assert!(dot.contains("\"preprocess_ID1\" -> \"analyze_ID2\""));
    }

    #[test]
    fn test_noop_job_marked() {
        let mut wf = ExecutableWorkflow::new("empty", 0);
        wf.add_job(ExecutableJob::noop("empty", 0));
        assert!(render_dag(&wf).contains("JOB noop_empty_0 noop_empty_0.sub NOOP\n"));
    }
}
