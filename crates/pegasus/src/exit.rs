//! Exit codes and error reporting at the tool boundary.

use std::fmt;

use pegasus_catalog::CatalogError;
use pegasus_config::FactoryError;
use pegasus_planner::PlannerError;

pub const SUCCESS: u8 = 0;
/// Usage mistakes and runtime failures.
pub const FAILURE: u8 = 1;
/// A pluggable implementation could not be selected.
pub const FACTORY: u8 = 2;
/// A panic escaped the handler.
pub const PANIC: u8 = 3;
/// Out of memory. Allocation failure aborts the process, so this is never
/// returned.
pub const OUT_OF_MEMORY: u8 = 4;

/// A malformed invocation detected after argument parsing.
#[derive(Debug)]
pub struct UsageError(pub String);

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UsageError {}

/// Shorthand for returning a [`UsageError`] from a handler.
pub fn usage(message: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(UsageError(message.into()))
}

/// The implementation-selection failure anywhere in `err`'s chain.
pub fn factory_error(err: &anyhow::Error) -> Option<&FactoryError> {
    err.chain().find_map(|cause| {
        if let Some(factory) = cause.downcast_ref::<FactoryError>() {
            return Some(factory);
        }
        if let Some(CatalogError::Factory(factory)) = cause.downcast_ref::<CatalogError>() {
            return Some(factory);
        }
        cause.downcast_ref::<PlannerError>().and_then(PlannerError::factory)
    })
}

pub fn classify(err: &anyhow::Error) -> u8 {
    if factory_error(err).is_some() {
        FACTORY
    } else {
        FAILURE
    }
}

/// Prints `err` to stderr, one cause per line. At `-vv` and above the
/// debug form follows.
pub fn report(tool: &str, err: &anyhow::Error, verbose: u8) {
    eprintln!("{tool}: {err}");
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
    if err.downcast_ref::<UsageError>().is_some() {
        eprintln!("Try '{tool} --help' for more information.");
    }
    if verbose >= 2 {
        eprintln!("{err:?}");
    }
}
