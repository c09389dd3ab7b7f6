//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject an empty backend pool before any listener exists
//! - Validate addresses (bind, metrics, backends) and paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::backend::parse_backend_url;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one backend must be configured")]
    EmptyBackendPool,

    #[error("backend {name:?} has invalid address {address:?}: {reason}")]
    InvalidBackendAddress {
        name: String,
        address: String,
        reason: String,
    },

    #[error("no accepted auth tokens configured")]
    EmptyTokenSet,

    #[error("auth header name {0:?} is not a valid header name")]
    InvalidAuthHeader(String),

    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),

    #[error("websocket path {0:?} must start with '/'")]
    InvalidPath(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::EmptyBackendPool);
    }
    for backend in &config.backends {
        if let Err(e) = parse_backend_url(&backend.address) {
            errors.push(ValidationError::InvalidBackendAddress {
                name: backend.name.clone(),
                address: backend.address.clone(),
                reason: e.to_string(),
            });
        }
    }

    if config.auth.tokens.iter().all(|t| t.is_empty()) {
        errors.push(ValidationError::EmptyTokenSet);
    }
    if axum::http::HeaderName::from_bytes(config.auth.header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidAuthHeader(config.auth.header.clone()));
    }

    for path in [&config.websocket.path, &config.websocket.backend_path] {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidPath(path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
