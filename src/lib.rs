//! Load-balancing reverse proxy for HTTP and WebSocket traffic.
//!
//! Requests pass a static token check, then go to the next backend in
//! round-robin order. WebSocket sessions are relayed message by message and
//! drained (bounded) on shutdown.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::{DrainOutcome, ShutdownCoordinator};
