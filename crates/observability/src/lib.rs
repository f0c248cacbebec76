//! Tracing/logging initialization shared by herald binaries.

use tracing_subscriber::EnvFilter;

/// Initialize process-wide tracing/logging.
///
/// JSON logs with timestamps, filtered via `RUST_LOG` (default `info`).
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    init_with_default_filter("info");
}

/// Initialize with an explicit fallback filter for when `RUST_LOG` is
/// unset (e.g. `"info,herald_dispatch=debug"`).
pub fn init_with_default_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
