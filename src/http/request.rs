//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) and echo it on the response
//! - Rewrite the request URI and Host for the selected backend
//! - Strip hop-by-hop headers and append `X-Forwarded-For`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Bodies are never inspected; only the head is rewritten

use std::net::SocketAddr;

use axum::http::{header, request::Parts, HeaderName, HeaderValue, Uri, Version};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::response::strip_hop_by_hop;
use crate::load_balancer::Backend;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Layer that assigns `x-request-id` when the client did not send one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Read the request ID assigned by [`set_request_id_layer`].
pub fn request_id(parts: &Parts) -> &str {
    parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Rewrite the request head in place so it targets `backend`.
pub fn prepare_forward(
    parts: &mut Parts,
    backend: &Backend,
    client_addr: Option<SocketAddr>,
) -> Result<(), axum::http::Error> {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    parts.uri = backend.http_url(path_and_query).parse::<Uri>()?;
    // The upstream client speaks HTTP/1.1 regardless of the inbound protocol.
    parts.version = Version::HTTP_11;

    strip_hop_by_hop(&mut parts.headers);

    let authority = backend.authority();
    parts
        .headers
        .insert(header::HOST, HeaderValue::from_str(&authority)?);

    if let Some(addr) = client_addr {
        let forwarded = match parts
            .headers
            .get(&X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
        {
            Some(prior) => format!("{}, {}", prior, addr.ip()),
            None => addr.ip().to_string(),
        };
        parts
            .headers
            .insert(X_FORWARDED_FOR, HeaderValue::from_str(&forwarded)?);
    }
    Ok(())
}
