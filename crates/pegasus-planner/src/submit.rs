//! Handing a planned workflow to `pegasus-run`.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{PlannerError, Result};
use crate::options::ForwardOption;

pub const RUN_COMMAND: &str = "pegasus-run";

/// Arguments to `pegasus-run`, without the program itself.
pub fn pegasus_run_arguments(
    properties_file: &Path,
    forward: &[ForwardOption],
    submit_dir: &Path,
) -> Vec<String> {
    let mut args = vec![format!("-Dpegasus.user.properties={}", properties_file.display())];
    for option in forward {
        args.push(format!("--{}", option.key));
        if let Some(value) = &option.value {
            args.push(value.clone());
        }
    }
    args.push(submit_dir.display().to_string());
    args
}

/// The command line as a user would type it.
pub fn display_invocation(args: &[String]) -> String {
    let mut line = RUN_COMMAND.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Runs `<bin_dir>/pegasus-run`, echoing its stdout and stderr as they
/// arrive, and fails when it exits non-zero.
pub async fn submit(bin_dir: &Path, args: &[String]) -> Result<()> {
    let program = bin_dir.join(RUN_COMMAND);
    let command = display_invocation(args);
    info!(command = %command, "submitting workflow");

    let mut child = Command::new(&program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| PlannerError::Spawn {
            command: program.display().to_string(),
            source: e,
        })?;

    let stdout = child.stdout.take().map(|out| {
        tokio::spawn(async move {
            let mut lines = BufReader::new(out).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                println!("{line}");
            }
        })
    });
    let stderr = child.stderr.take().map(|err| {
        tokio::spawn(async move {
            let mut lines = BufReader::new(err).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                eprintln!("{line}");
            }
        })
    });
    if let Some(task) = stdout {
        let _ = task.await;
    }
    if let Some(task) = stderr {
        let _ = task.await;
    }

    let status = child.wait().await.map_err(|e| PlannerError::Spawn {
        command: program.display().to_string(),
        source: e,
    })?;
    debug!(%status, "pegasus-run finished");
    if status.success() {
        Ok(())
    } else {
        Err(PlannerError::Submit {
            command,
            status: status.to_string(),
        })
    }
}
