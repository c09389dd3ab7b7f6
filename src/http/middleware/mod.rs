//! Request middleware applied in front of the relay handlers.

pub mod auth;

pub use auth::{auth_middleware, AuthGate};
