//! Structured logging.
//!
//! Uses `tracing` with an env filter; `RUST_LOG` overrides the configured level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for a configured level.
pub fn default_directive(level: &str) -> String {
    format!("relay_proxy={level},tower_http={level}")
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive(level).into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
