//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → http::middleware::auth (extract credential header)
//!     → tokens.rs (static membership check)
//!     → allowed: relay handler; denied: 403, no backend contact
//! ```

pub mod tokens;

pub use tokens::TokenSet;
