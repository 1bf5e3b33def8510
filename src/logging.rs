//! Tracing subscriber setup
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the embedding application (or a test harness). [`init`] is the subscriber an
//! application gets if it has no logging setup of its own, filtered through
//! `RUST_LOG` (e.g. `RUST_LOG=graphcache::sync=debug`).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a stderr subscriber filtered by `RUST_LOG`, falling back to `default_directive`
///
/// Fails if a global subscriber is already installed.
pub fn init(default_directive: &str) -> crate::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init()
        .map_err(|e| crate::GraphCacheError::Other(format!("Failed to initialize tracing: {}", e)))
}

/// Logging for test harnesses: test-captured output, safe to call repeatedly
pub fn init_test() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_test_writer())
        .try_init();
}
