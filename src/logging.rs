//! Logging configuration for askdb.
//!
//! Logs go to stderr so the JSON answer on stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

/// Initializes stderr logging with an env-controlled filter.
///
/// Honors `RUST_LOG`; defaults to `info` when unset.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
