//! Backend pool management.
//!
//! # Responsibilities
//! - Hold the ordered, immutable list of backends
//! - Guarantee the pool is non-empty once constructed

use std::sync::Arc;

use thiserror::Error;

use crate::config::BackendConfig;
use crate::load_balancer::backend::{AddressError, Backend};

/// Errors building a backend pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("backend pool is empty")]
    Empty,

    #[error("backend {name:?}: {source}")]
    Address {
        name: String,
        #[source]
        source: AddressError,
    },
}

/// Ordered, fixed-size set of backends. Read-only after construction.
#[derive(Debug, Clone)]
pub struct BackendPool {
    backends: Arc<[Backend]>,
}

impl BackendPool {
    /// Create a pool; an empty list is rejected.
    pub fn new(backends: Vec<Backend>) -> Result<Self, PoolError> {
        if backends.is_empty() {
            return Err(PoolError::Empty);
        }
        Ok(Self {
            backends: backends.into(),
        })
    }

    /// Create a pool from configuration entries, preserving their order.
    pub fn from_config(configs: &[BackendConfig]) -> Result<Self, PoolError> {
        let backends = configs
            .iter()
            .map(|config| {
                Backend::from_config(config).map_err(|source| PoolError::Address {
                    name: config.name.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for backend in backends.iter() {
            tracing::debug!(name = %backend.name, url = %backend.base_url, "Backend registered");
        }
        Self::new(backends)
    }

    /// Number of backends. Always at least one.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Backend at `index`, wrapping around the pool size.
    pub fn get_wrapping(&self, index: usize) -> &Backend {
        &self.backends[index % self.backends.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backend> {
        self.backends.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_is_rejected() {
        assert!(matches!(BackendPool::new(Vec::new()), Err(PoolError::Empty)));
        assert!(matches!(BackendPool::from_config(&[]), Err(PoolError::Empty)));
    }

    #[test]
    fn preserves_configured_order() {
        let pool = BackendPool::from_config(&[
            BackendConfig::new("a", "127.0.0.1:1"),
            BackendConfig::new("b", "127.0.0.1:2"),
        ])
        .unwrap();
        let names: Vec<_> = pool.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(pool.get_wrapping(3).name, "b");
    }

    #[test]
    fn bad_address_names_the_backend() {
        let err = BackendPool::from_config(&[BackendConfig::new("x", "gopher://nope")]).unwrap_err();
        assert!(matches!(err, PoolError::Address { ref name, .. } if name == "x"));
    }
}
