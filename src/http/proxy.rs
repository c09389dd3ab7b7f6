//! HTTP relay handler.
//!
//! One request, one backend: the selected backend either answers or the
//! client gets `502 Bad Gateway`. No retries, no second backend.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
};

use crate::http::request::{self, prepare_forward};
use crate::http::response::{bad_gateway, passthrough};
use crate::http::server::AppState;
use crate::observability::metrics;

/// Main proxy handler.
/// Selects the next backend and streams the request/response through it.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let backend = state.selector.next();

    let (mut parts, body) = request.into_parts();
    let method = parts.method.to_string();
    let request_id = request::request_id(&parts).to_string();
    let client_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %parts.uri.path(),
        backend = %backend.name,
        "Proxying request"
    );

    if let Err(e) = prepare_forward(&mut parts, backend, client_addr) {
        tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream request");
        metrics::record_request(&method, 502, &backend.name, start_time);
        return bad_gateway();
    }

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), &backend.name, start_time);
            passthrough(response)
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                backend = %backend.name,
                error = %e,
                "Upstream error"
            );
            metrics::record_request(&method, 502, &backend.name, start_time);
            bad_gateway()
        }
    }
}
