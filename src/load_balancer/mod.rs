//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! BackendConfig[] (validated)
//!     → backend.rs (parse address, pre-compute URLs)
//!     → pool.rs (ordered, immutable, non-empty)
//!     → round_robin.rs (atomic cursor over the pool)
//!     → &Backend handed to the HTTP or WebSocket relay
//! ```
//!
//! # Design Decisions
//! - No health awareness: a downed backend stays in rotation
//! - The cursor is the only mutable state, advanced with a single atomic add

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::Backend;
pub use pool::{BackendPool, PoolError};
pub use round_robin::RoundRobin;
