//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration before anything is bound
//! - Build the backend pool and HTTP server
//! - Bind the listener last (traffic only when ready)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal

use std::io;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{validate_config, ConfigError, ProxyConfig};
use crate::http::HttpServer;
use crate::load_balancer::PoolError;

/// Errors that stop the process before it serves traffic.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid backend pool: {0}")]
    Pool(#[from] PoolError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// Validation phase: reject bad configuration with a typed error.
pub fn validate(config: &ProxyConfig) -> Result<(), StartupError> {
    validate_config(config).map_err(|errors| StartupError::Config(ConfigError::Validation(errors)))
}

/// Validate, build the server, then bind its listener.
pub async fn start(config: ProxyConfig) -> Result<(HttpServer, TcpListener), StartupError> {
    let server = HttpServer::new(config)?;

    let address = server.config().listener.bind_address.clone();
    let bind_error = |source| StartupError::Bind {
        address: address.clone(),
        source,
    };
    let listener = TcpListener::bind(&address).await.map_err(bind_error)?;
    let local_addr = listener.local_addr().map_err(bind_error)?;

    tracing::info!(
        address = %local_addr,
        backends = server.selector().pool().len(),
        "Listening for connections"
    );
    Ok((server, listener))
}
