//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::backend::Backend;
use crate::load_balancer::pool::BackendPool;

/// Round-robin selector.
/// Stores an internal counter to rotate through backends.
///
/// The counter wraps on overflow; selection after a wrap stays inside the pool.
#[derive(Debug)]
pub struct RoundRobin {
    pool: BackendPool,
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new(pool: BackendPool) -> Self {
        Self::with_offset(pool, 0)
    }

    /// Start the rotation at an arbitrary cursor value.
    pub fn with_offset(pool: BackendPool, offset: usize) -> Self {
        Self {
            pool,
            counter: AtomicUsize::new(offset),
        }
    }

    /// Select the next backend. Lock-free; safe under any number of callers.
    pub fn next(&self) -> &Backend {
        let cursor = self.counter.fetch_add(1, Ordering::Relaxed);
        self.pool.get_wrapping(cursor)
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }
}
