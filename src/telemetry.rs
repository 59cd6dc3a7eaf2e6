//! Tracing/logging initialization.
//!
//! Everything goes to stderr so tables and CSV on stdout stay pipeable.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process.
///
/// `RUST_LOG` wins when set; otherwise only warnings are shown, or debug
/// output for this crate when `verbose` is on. Safe to call more than once
/// (later calls are no-ops).
pub fn init(verbose: bool, json: bool) {
    let default_directive = if verbose { "tripsplit=debug,warn" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}
