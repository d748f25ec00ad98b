//! Tracing setup shared by all tools.

use tracing_subscriber::EnvFilter;

/// Level names from quietest to loudest. Tools start at `warn`.
const LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];
const DEFAULT_LEVEL: usize = 2;

/// The filter directive for `verbose` `-v` and `quiet` `-q` flags.
pub fn level(verbose: u8, quiet: u8) -> &'static str {
    let index = (DEFAULT_LEVEL + verbose as usize).saturating_sub(quiet as usize);
    LEVELS[index.min(LEVELS.len() - 1)]
}

/// Installs the stderr subscriber. `RUST_LOG` wins over the flags when set.
/// Calling this twice is harmless; the first subscriber stays.
pub fn init(verbose: u8, quiet: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level(verbose, quiet)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ladder() {
        assert_eq!(level(0, 0), "warn");
        assert_eq!(level(1, 0), "info");
        assert_eq!(level(2, 0), "debug");
        assert_eq!(level(7, 0), "trace");
        assert_eq!(level(0, 1), "error");
        assert_eq!(level(0, 5), "off");
        assert_eq!(level(1, 1), "warn");
    }
}
