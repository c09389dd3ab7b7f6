//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build pool & server → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     trigger() → Draining: stop accepting → wait for sessions (bounded) → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls trigger()
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Shutdown has timeout: forced exit after deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{DrainOutcome, ShutdownCoordinator, ShutdownState};
pub use startup::StartupError;
