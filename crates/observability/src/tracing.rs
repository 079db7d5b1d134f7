//! Tracing/logging initialization.
//!
//! The kernel crates emit structured events through `tracing`; this is the
//! single place a process (or a test harness) turns them into output.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Filtering defaults to `info` and follows `RUST_LOG` when set. Safe to
/// call multiple times (subsequent calls are no-ops), so test binaries can
/// call it from every test.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(false)
        .try_init();
}
