//! Structured logging init: a JSON-formatted `tracing-subscriber` in
//! verbose mode, otherwise quiet (warnings and above only) so interactive
//! CLI output isn't drowned out.

use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber. `verbose` enables `info`
/// level and below via `RUST_LOG`-style filtering; otherwise only `warn`
/// and `error` events reach the terminal.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
