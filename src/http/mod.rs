//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → middleware/auth.rs (auth gate, 403 on failure)
//!     → proxy.rs (HTTP relay) | websocket.rs (WebSocket relay)
//!     → request.rs (rewrite head for the selected backend)
//!     → response.rs (strip hop-by-hop headers, stream back)
//!     → Send to client
//! ```

pub mod middleware;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
