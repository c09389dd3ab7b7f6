//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Upgraded WebSocket with backend dialed
//!     → session.rs (begin: count +1, guard held by the relay)
//!     → relay runs
//!     → guard dropped (count -1, wake drain waiters at zero)
//! ```
//!
//! # Design Decisions
//! - The drain barrier counts sessions, not task handles
//! - Release is tied to `Drop`, so errors and panics cannot leak a count

pub mod session;

pub use session::{SessionGuard, SessionId, SessionTracker};
