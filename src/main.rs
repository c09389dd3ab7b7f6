//! Relay proxy binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                 RELAY PROXY                  │
//!     Client Request    │  ┌──────────┐   ┌──────────┐                 │
//!     ──────────────────┼─▶│   auth   │──▶│  http    │──┐              │
//!                       │  │   gate   │   │  relay   │  │              │
//!                       │  └────┬─────┘   └──────────┘  ▼              │
//!                       │       │                  ┌──────────┐        │
//!                       │       │                  │  round   │        │      Backend
//!                       │       ▼                  │  robin   │────────┼────▶ Servers
//!                       │  ┌──────────┐            └──────────┘        │
//!     WebSocket ◀──────▶┼─▶│websocket │──────────────────▲             │
//!                       │  │  relay   │◀─ session tracker ─ shutdown   │
//!                       │  └──────────┘                                │
//!                       └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use relay_proxy::config::load_config;
use relay_proxy::lifecycle::{signals, startup, DrainOutcome, ShutdownCoordinator};
use relay_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "Round-robin HTTP and WebSocket reverse proxy", long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML, or JSON with a .json extension).
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging("info");
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        drain_timeout_secs = config.shutdown.drain_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validated by load_config.
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let (server, listener) = startup::start(config).await?;

    let shutdown = ShutdownCoordinator::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::termination_signal().await;
        trigger.trigger();
    });

    match server.run(listener, shutdown).await? {
        DrainOutcome::Graceful => tracing::info!("Shutdown complete"),
        DrainOutcome::Forced { remaining } => {
            tracing::info!(abandoned_sessions = remaining, "Shutdown complete (forced)")
        }
    }
    Ok(())
}
