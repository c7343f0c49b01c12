//! # Tracing Setup
//!
//! Installs the global `tracing` subscriber for binaries and tests that
//! embed the engine.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages everywhere
//! - `RUST_LOG=toolhub_engine=trace` - Trace one crate only
//! - Default: `info,toolhub=debug,sqlx=warn`

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,toolhub=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing();
        tracing::info!("still logging");
    }
}
