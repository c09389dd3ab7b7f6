//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Pre-compute the base URL used for HTTP forwarding
//! - Derive the WebSocket endpoint of the backend

use std::fmt;

use thiserror::Error;
use url::Url;

use crate::config::BackendConfig;

/// Reasons a configured backend address cannot be used.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("{0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme {0:?}, expected http")]
    UnsupportedScheme(String),

    #[error("address has no host")]
    MissingHost,
}

/// Parse a configured address into an HTTP base URL.
///
/// Bare `host:port` addresses are treated as `http://host:port`.
pub fn parse_backend_url(address: &str) -> Result<Url, AddressError> {
    let address = address.trim();
    let url = if address.contains("://") {
        Url::parse(address)?
    } else {
        Url::parse(&format!("http://{}", address))?
    };

    match url.scheme() {
        "http" => {}
        other => return Err(AddressError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().is_none() {
        return Err(AddressError::MissingHost);
    }
    Ok(url)
}

/// A single backend server.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Display name from configuration.
    pub name: String,
    /// The address exactly as configured.
    pub address: String,
    /// Pre-calculated base URL for performance.
    pub base_url: Url,
}

impl Backend {
    /// Create a backend from its configuration entry.
    pub fn from_config(config: &BackendConfig) -> Result<Self, AddressError> {
        let base_url = parse_backend_url(&config.address)?;
        let name = if config.name.is_empty() {
            config.address.clone()
        } else {
            config.name.clone()
        };
        Ok(Self {
            name,
            address: config.address.clone(),
            base_url,
        })
    }

    /// The `host:port` authority used when rewriting request URIs.
    pub fn authority(&self) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        match self.base_url.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Build the forwarding URL for an inbound path and query.
    ///
    /// A path prefix on the configured address is kept in front of the inbound path.
    pub fn http_url(&self, path_and_query: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        if path_and_query.starts_with('/') {
            format!("{}{}", base, path_and_query)
        } else {
            format!("{}/{}", base, path_and_query)
        }
    }

    /// Derive the WebSocket endpoint: same location, `ws` scheme, fixed path.
    pub fn websocket_url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        // http → ws stays within the special schemes, which `set_scheme` allows.
        let _ = url.set_scheme("ws");
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}
