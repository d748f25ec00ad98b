//! Runs the whole workflow as one sequential shell script.

use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::debug;

use super::{CodeGenerator, GeneratorContext, shell_quote, write_file};
use crate::error::{PlannerError, Result};
use crate::workflow::{ExecutableWorkflow, JobKind};

#[derive(Debug, Default, Clone, Copy)]
pub struct ShellGenerator;

impl CodeGenerator for ShellGenerator {
    fn generate(&self, workflow: &ExecutableWorkflow, ctx: &GeneratorContext<'_>) -> Result<Vec<PathBuf>> {
        let path = self.main_file(ctx);
        write_file(&path, &render_script(workflow)?)?;
        make_executable(&path)?;
        debug!(path = %path.display(), jobs = workflow.len(), "wrote shell workflow");
        Ok(vec![path])
    }

    fn main_file(&self, ctx: &GeneratorContext<'_>) -> PathBuf {
        ctx.submit_dir.join(format!("{}.sh", ctx.basename))
    }
}

/// Jobs in dependency order, each in a subshell so directory and
/// environment changes stay local.
pub fn render_script(workflow: &ExecutableWorkflow) -> Result<String> {
    let mut out = String::new();
    out.push_str("#!/bin/bash\n");
    let _ = writeln!(
        out,
        "# workflow {}, index {}, count {}",
        workflow.label, workflow.index, workflow.count
    );
    out.push_str("set -e\n");

    for job in workflow.topological_order()? {
        out.push('\n');
        if job.kind == JobKind::Noop {
            let _ = writeln!(out, "# {} (noop)", job.name);
            continue;
        }
        let _ = writeln!(out, "# {} on {}", job.name, job.site);
        out.push_str("(\n");
        if let Some(dir) = &job.working_dir {
            let _ = writeln!(out, "  mkdir -p {dir} && cd {dir}", dir = shell_quote(dir));
        }
        for p in job.profiles_in("env") {
            let _ = writeln!(out, "  export {}={}", p.key, shell_quote(&p.value));
        }
        let mut line = format!("  {}", shell_quote(&job.executable));
        if !job.arguments.is_empty() {
            line.push(' ');
            line.push_str(&job.arguments);
        }
        if let Some(stdin) = &job.stdin {
            let _ = write!(line, " < {}", shell_quote(stdin));
        }
        if let Some(stdout) = &job.stdout {
            let _ = write!(line, " > {}", shell_quote(stdout));
        }
        if let Some(stderr) = &job.stderr {
            let _ = write!(line, " 2> {}", shell_quote(stderr));
        }
        out.push_str(&line);
        out.push_str("\n)\n");
    }
    Ok(out)
}

#[cfg(unix)]
fn make_executable(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
        PlannerError::WriteFile {
            path: path.display().to_string(),
            source: e,
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &std::path::Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::ExecutableJob;
    use pegasus_catalog::{CatalogProfile, SiteStore};
    use tempfile::TempDir;

    fn workflow() -> ExecutableWorkflow {
        let mut wf = ExecutableWorkflow::new("pipe", 0);
        let mut last = ExecutableJob::new("ID2", "cat_ID2", "local", "/bin/cat");
        last.stdin = Some("in file".into());
        last.stdout = Some("out.txt".into());
        wf.add_job(last);
        let mut first = ExecutableJob::new("ID1", "echo_ID1", "local", "/bin/echo");
        first.arguments = "hello".into();
        first.working_dir = Some("/tmp/run 1".into());
        first.profiles.push(CatalogProfile::new("env", "GREETING", "hi there"));
        wf.add_job(first);
        wf.add_edge("ID2", "ID1");
        wf
    }

    #[test]
    fn test_script_order_and_redirects() {
        let script = render_script(&workflow()).unwrap();
        assert!(script.starts_with("#!/bin/bash\n"));
        let echo = script.find("/bin/echo hello").unwrap();
        let cat = script.find("/bin/cat < 'in file' > out.txt").unwrap();
        assert!(echo < cat);
        assert!(script.contains("mkdir -p '/tmp/run 1' && cd '/tmp/run 1'"));
        assert!(script.contains("export GREETING='hi there'"));
    }

    #[test]
    fn test_noop_is_comment() {
        let mut wf = ExecutableWorkflow::new("empty", 3);
        wf.add_job(ExecutableJob::noop("empty", 3));
        let script = render_script(&wf).unwrap();
        assert!(script.contains("# noop_empty_3 (noop)"));
        assert!(!script.contains("/bin/true"));
    }

    #[cfg(unix)]
    #[test]
    fn test_generate_sets_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let sites = SiteStore::new();
        let ctx = GeneratorContext {
            submit_dir: dir.path(),
            basename: "pipe-0",
            sites: &sites,
        };
        let files = ShellGenerator.generate(&workflow(), &ctx).unwrap();
        assert_eq!(files, vec![dir.path().join("pipe-0.sh")]);
        let mode = std::fs::metadata(&files[0]).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
