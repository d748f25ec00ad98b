//! pegasus-plan: maps a DAX onto execution sites and writes the executable
//! workflow into a submit directory.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::info;

use pegasus_planner::{ForwardOption, PlanOutcome, PlannerOptions, RandomDir, SUCCESS_MESSAGE, split_list};

use super::Context;
use crate::cli::{GlobalArgs, Tool};

/// Plan an abstract workflow onto execution sites
#[derive(Parser, Debug)]
#[command(name = "pegasus-plan", author, version, about, long_about = None)]
pub struct PlanArgs {
    /// The DAX file to plan
    #[arg(short = 'd', long, value_name = "FILE")]
    pub dax: PathBuf,

    /// Base directory under which submit directories are created
    #[arg(short = 'D', long = "dir", value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Execution sites, comma-separated (repeatable). Defaults to every site
    #[arg(short = 's', long, value_name = "SITES")]
    pub sites: Vec<String>,

    /// Site that receives the workflow outputs
    #[arg(short = 'o', long = "output-site", visible_alias = "output", value_name = "SITE")]
    pub output: Option<String>,

    /// Directory on the output site for the workflow outputs
    #[arg(short = 'O', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Remote directory name, relative to each site's scratch space
    #[arg(long = "relative-dir", value_name = "DIR")]
    pub relative_dir: Option<String>,

    /// Submit directory relative to --dir, used as is
    #[arg(long = "relative-submit-dir", value_name = "DIR")]
    pub relative_submit_dir: Option<String>,

    /// Plan into a submit directory even if it is not empty
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Submit the planned workflow with pegasus-run
    #[arg(short = 'S', long)]
    pub submit: bool,

    /// Clustering techniques, comma-separated (not supported, recorded only)
    #[arg(short = 'C', long, value_name = "STYLES")]
    pub cluster: Vec<String>,

    /// Use a separate remote directory; a name is derived when none is given
    #[arg(
        short = 'r',
        long = "randomdir",
        value_name = "NAME",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = ""
    )]
    pub randomdir: Option<String>,

    /// Basename for the generated files
    #[arg(short = 'b', long, value_name = "PREFIX")]
    pub basename: Option<String>,

    /// VO group used in the submit directory path
    #[arg(short = 'g', long = "group", value_name = "GROUP")]
    pub group: Option<String>,

    /// Prefix for generated job names
    #[arg(short = 'j', long = "job-prefix", value_name = "PREFIX")]
    pub job_prefix: Option<String>,

    /// Do not generate the cleanup workflow
    #[arg(short = 'n', long)]
    pub nocleanup: bool,

    /// Option passed through to pegasus-run, as option[=value] (repeatable)
    #[arg(short = 'F', long, value_name = "OPTION")]
    pub forward: Vec<String>,

    /// Resubmit the existing dag until this many rescue dags exist
    #[arg(long, value_name = "TRIES", default_value_t = 0)]
    pub rescue: u32,

    #[command(flatten)]
    pub globals: GlobalArgs,
}

impl Tool for PlanArgs {
    const NAME: &'static str = "pegasus-plan";

    fn globals(&self) -> GlobalArgs {
        self.globals.clone()
    }
}

impl PlanArgs {
    pub fn options(&self) -> Result<PlannerOptions> {
        let mut options = PlannerOptions::new(&self.dax);
        options.sites = split_list(&self.sites);
        options.output_site = self.output.clone();
        options.output_dir = self.output_dir.clone();
        options.base_dir = self.dir.clone();
        options.relative_dir = self.relative_dir.clone();
        options.relative_submit_dir = self.relative_submit_dir.clone();
        options.force = self.force;
        options.submit = self.submit;
        options.cluster = split_list(&self.cluster);
        options.random_dir = match self.randomdir.as_deref() {
            None => RandomDir::Off,
            Some("") => RandomDir::Generated,
            Some(name) => RandomDir::Named(name.to_string()),
        };
        options.basename = self.basename.clone();
        options.vogroup = self.group.clone();
        options.job_prefix = self.job_prefix.clone();
        options.cleanup = !self.nocleanup;
        options.forward = self
            .forward
            .iter()
            .map(|f| ForwardOption::parse(f))
            .collect::<pegasus_planner::Result<_>>()?;
        options.rescue_tries = self.rescue;
        Ok(options)
    }
}

/// Run pegasus-plan.
pub fn run(args: PlanArgs, ctx: &Context) -> Result<()> {
    let options = args.options()?;
    let props = ctx.properties()?;

    let runtime = tokio::runtime::Runtime::new().context("unable to start the async runtime")?;
    let outcome = runtime
        .block_on(pegasus_planner::plan(&props, &options))
        .with_context(|| format!("failed to plan '{}'", options.dax.display()))?;

    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &PlanOutcome) {
    if outcome.rescue
        && let Some(dag) = outcome.files.first()
    {
        println!("Rescue dag will be submitted: {}", dag.display());
    }
    if outcome.empty {
        info!("the workflow has no jobs, a single noop job was planned");
    }
    if outcome.submitted {
        println!("Submitted workflow from {}", outcome.submit_dir.display());
    } else {
        println!("\n\n{SUCCESS_MESSAGE}\n\n{}\n", outcome.invocation());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> PlanArgs {
        let mut argv = vec!["pegasus-plan"];
        argv.extend_from_slice(args);
        PlanArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_options_mapping() {
        let args = parse(&[
            "-d", "w.dax", "-D", "/submit", "-s", "isi,local", "-s", "uc", "-n", "-F", "nogrid", "--rescue", "3",
        ]);
        let options = args.options().unwrap();
        assert_eq!(options.sites, vec!["isi", "local", "uc"]);
        assert_eq!(options.base_dir, PathBuf::from("/submit"));
        assert!(!options.cleanup);
        assert_eq!(options.forward[0].key, "nogrid");
        assert_eq!(options.rescue_tries, 3);
        assert_eq!(options.random_dir, RandomDir::Off);
    }

    #[test]
    fn test_randomdir_forms() {
        assert_eq!(parse(&["-d", "w.dax", "--randomdir"]).options().unwrap().random_dir, RandomDir::Generated);
        assert_eq!(
            parse(&["-d", "w.dax", "--randomdir=scratch"]).options().unwrap().random_dir,
            RandomDir::Named("scratch".into())
        );
    }

    #[test]
    fn test_dax_is_required() {
        assert!(PlanArgs::try_parse_from(["pegasus-plan", "-s", "local"]).is_err());
    }
}
