//! The runner every tool's `main` goes through.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ArgAction, Args, Parser};
use tracing::{error, warn};

use pegasus_config::parse_override;

use crate::commands::Context;
use crate::exit::{self, FAILURE, PANIC, SUCCESS};
use crate::logging;

// ─────────────────────────────────────────────────────────────────────────────
// Shared flags
// ─────────────────────────────────────────────────────────────────────────────

/// Flags accepted by every tool.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Increase logging verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Decrease logging verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,

    /// Emit log records as JSON lines
    #[arg(long)]
    pub json_log: bool,

    /// Properties file used instead of ./pegasus.properties
    #[arg(short = 'c', long, value_name = "FILE")]
    pub conf: Option<PathBuf>,
}

/// A parsed tool invocation.
pub trait Tool: Parser {
    /// Binary name used in messages.
    const NAME: &'static str;

    fn globals(&self) -> GlobalArgs;
}

// ─────────────────────────────────────────────────────────────────────────────
// Property overrides
// ─────────────────────────────────────────────────────────────────────────────

/// `-Dkey=value`, attached. A bare `-D` belongs to the tool's own options.
pub fn is_property_override(arg: &str) -> bool {
    arg.len() > 2 && arg.starts_with("-D") && arg.contains('=')
}

/// Pulls `-Dkey=value` arguments out of `args` ahead of option parsing.
/// The program name and anything after `--` are left alone.
pub fn split_property_overrides<I>(args: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    let mut kept = Vec::new();
    let mut overrides = Vec::new();
    let mut literal = false;
    for (i, arg) in args.into_iter().enumerate() {
        if i > 0 && !literal && is_property_override(&arg) {
            overrides.push(arg);
            continue;
        }
        if arg == "--" {
            literal = true;
        }
        kept.push(arg);
    }
    (kept, overrides)
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner
// ─────────────────────────────────────────────────────────────────────────────

/// Runs `handler` on the process arguments.
pub fn run<T, F>(handler: F) -> ExitCode
where
    T: Tool,
    F: FnOnce(T, &Context) -> anyhow::Result<()>,
{
    run_from(std::env::args(), handler)
}

pub fn run_from<T, F, I>(args: I, handler: F) -> ExitCode
where
    T: Tool,
    F: FnOnce(T, &Context) -> anyhow::Result<()>,
    I: IntoIterator<Item = String>,
{
    let (args, defines) = split_property_overrides(args);
    let tool = match T::try_parse_from(args) {
        Ok(tool) => tool,
        Err(e) => return parse_failure(e),
    };
    let globals = tool.globals();
    logging::init(globals.verbose, globals.quiet, globals.json_log);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<()> {
        let overrides = defines
            .iter()
            .map(|d| parse_override(d).map_err(|e| exit::usage(e.to_string())))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let ctx = Context::new(T::NAME, &globals, overrides);
        handler(tool, &ctx)
    }));

    let code = match outcome {
        Ok(Ok(())) => SUCCESS,
        Ok(Err(err)) => {
            exit::report(T::NAME, &err, globals.verbose);
            exit::classify(&err)
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(tool = T::NAME, panic = %message, "unexpected failure");
            PANIC
        }
    };
    finish(code)
}

fn parse_failure(err: clap::Error) -> ExitCode {
    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => {
            logging::init(0, 0, false);
            finish(FAILURE)
        }
    }
}

fn finish(code: u8) -> ExitCode {
    if code != SUCCESS {
        warn!("Non-zero exit-code {code}");
    }
    ExitCode::from(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_property_overrides() {
        let (kept, defines) = split_property_overrides(strings(&[
            "pegasus-plan",
            "-Dpegasus.code.generator=Shell",
            "-D",
            "/submit",
            "--dax",
            "w.dax",
            "--",
            "-Dliteral=1",
        ]));
        assert_eq!(defines, vec!["-Dpegasus.code.generator=Shell"]);
        assert_eq!(kept, strings(&["pegasus-plan", "-D", "/submit", "--dax", "w.dax", "--", "-Dliteral=1"]));
    }

    #[test]
    fn test_attached_dir_is_not_an_override() {
        assert!(!is_property_override("-D/tmp/submit"));
        assert!(!is_property_override("-D"));
        assert!(is_property_override("-Da=b"));
    }

    #[derive(Parser, Debug)]
    #[command(name = "probe")]
    struct Probe {
        #[arg(long)]
        fail: Option<String>,

        #[command(flatten)]
        globals: GlobalArgs,
    }

    impl Tool for Probe {
        const NAME: &'static str = "probe";

        fn globals(&self) -> GlobalArgs {
            self.globals.clone()
        }
    }

    fn probe(args: &[&str]) -> ExitCode {
        let mut argv = vec!["probe"];
        argv.extend_from_slice(args);
        run_from(strings(&argv), |probe: Probe, ctx| {
            assert_eq!(ctx.tool, "probe");
            match probe.fail.as_deref() {
                Some("usage") => Err(exit::usage("bad")),
                Some("factory") => Err(pegasus_config::FactoryError::new("m", "x", "unknown").into()),
                Some("panic") => panic!("boom"),
                _ => Ok(()),
            }
        })
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(probe(&[]), ExitCode::from(SUCCESS));
        assert_eq!(probe(&["--fail", "usage"]), ExitCode::from(FAILURE));
        assert_eq!(probe(&["--fail", "factory"]), ExitCode::from(exit::FACTORY));
        assert_eq!(probe(&["--fail", "panic"]), ExitCode::from(PANIC));
        assert_eq!(probe(&["--bogus"]), ExitCode::from(FAILURE));
        assert_eq!(probe(&["-Dnot-a-pair"]), ExitCode::from(FAILURE));
        assert_eq!(probe(&["--help"]), ExitCode::SUCCESS);
    }
}
