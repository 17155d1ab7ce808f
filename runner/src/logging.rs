//! Development-time tracing for debugging the runner.
//!
//! Tracing goes to stderr and is never persisted. Agent output is a product
//! artifact written per attempt by `io::agent`, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; falls back to `default_directive` (e.g. `warn`, or
/// `info` with `--verbose`). Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=task_runner=debug task-runner resolve
/// ```
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
