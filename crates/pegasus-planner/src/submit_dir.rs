//! Submit directory layout.
//!
//! Planned workflows land in `base/user/vogroup/label/runNNNN`, or a
//! timestamp instead of the run number when configured.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use pegasus_config::SubmitDirMode;

use crate::error::{PlannerError, Result};

pub const RUN_PREFIX: &str = "run";

/// Makes sure `dir` is a writable directory, creating it if needed.
pub fn sanity_check(dir: &Path) -> Result<()> {
    let fail = |message: &str| PlannerError::Directory {
        path: dir.display().to_string(),
        message: message.to_string(),
    };
    match std::fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => Err(fail("exists but is not a directory")),
        Ok(meta) if meta.permissions().readonly() => Err(fail("cannot write to existing directory")),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::create_dir_all(dir).map_err(|e| PlannerError::Directory {
                path: dir.display().to_string(),
                message: format!("unable to create directory: {e}"),
            })
        }
        Err(e) => Err(PlannerError::Directory {
            path: dir.display().to_string(),
            message: e.to_string(),
        }),
    }
}

/// One past the highest `runNNNN` directory in `dir`, starting at 1.
pub fn next_run_number(dir: &Path) -> u32 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 1;
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name();
            let digits = name.to_str()?.strip_prefix(RUN_PREFIX)?;
            (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
                .then(|| digits.parse::<u32>().ok())
                .flatten()
        })
        .map(|n| n + 1)
        .max()
        .unwrap_or(1)
}

/// The timestamp used in directory and file names, e.g. `20240102T030405-0800`.
pub fn timestamp(at: &DateTime<Local>) -> String {
    at.format("%Y%m%dT%H%M%S%z").to_string()
}

/// Creates the run directory below `base` and returns its path relative
/// to `base`.
pub fn create_submit_directory(
    base: &Path,
    user: &str,
    vogroup: &str,
    label: &str,
    mode: SubmitDirMode,
    now: &DateTime<Local>,
) -> Result<PathBuf> {
    sanity_check(base)?;
    let mut relative = PathBuf::from(user);
    relative.push(vogroup);
    relative.push(label);
    sanity_check(&base.join(&relative))?;

    let leaf = match mode {
        SubmitDirMode::Timestamp => timestamp(now),
        SubmitDirMode::RunNumber => {
            format!("{RUN_PREFIX}{:04}", next_run_number(&base.join(&relative)))
        }
    };
    relative.push(leaf);
    let full = base.join(&relative);
    debug!(path = %full.display(), "creating submit directory");
    sanity_check(&full)?;
    Ok(relative)
}

/// Whether `dir` holds anything.
pub fn is_non_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// The submitting user's name.
pub fn current_user() -> String {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .find_map(|k| std::env::var(k).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "user".to_string())
}

/// Remote directory name for `-r` without a value: `basename-timestamp`
/// when a basename is given, else `label-index-timestamp`.
pub fn random_directory_name(
    label: &str,
    index: u32,
    basename: Option<&str>,
    now: &DateTime<Local>,
) -> String {
    let stamp = timestamp(now);
    match basename {
        Some(b) => format!("{b}-{stamp}"),
        None => format!("{label}-{index}-{stamp}"),
    }
}
