//! Logging setup for the trainer.
//!
//! Library code logs through both `log` and `tracing` macros with a
//! `[Component]` prefix. `init` installs a `tracing` subscriber that also
//! captures `log` records:
//! - `RUST_LOG` filter support, `hint_trainer=info` by default
//! - JSON lines when `RUST_LOG_FORMAT=json`
//! - human-readable lines on stderr otherwise

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "hint_trainer=info";

/// Initialize the global subscriber with the default filter.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    init_with_default(DEFAULT_FILTER);
}

/// Initialize with `default_filter` as the fallback directive, e.g.
/// `hint_trainer=debug` for a verbose CLI run. `RUST_LOG` still wins.
pub fn init_with_default(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if json_requested() {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

fn json_requested() -> bool {
    std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init_with_default("hint_trainer=debug");
        log::info!("[Logging] still usable after repeated init");
    }

    #[test]
    fn test_default_filter_parses() {
        let filter = EnvFilter::try_new(DEFAULT_FILTER).unwrap();
        assert!(format!("{filter:?}").contains("hint_trainer"));
    }
}
