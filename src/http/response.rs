//! Response handling and transformation.
//!
//! # Responsibilities
//! - Hand the backend response back to the client as a stream
//! - Strip hop-by-hop headers in both directions
//! - Map backend failures to a gateway error
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - A failed backend call is never retried elsewhere; it becomes 502

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};

/// Headers that apply to a single connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove(header::UPGRADE);
}

/// Convert a backend response into the client response without touching the body.
pub fn passthrough<B>(response: axum::http::Response<B>) -> Response
where
    B: axum::body::HttpBody<Data = axum::body::Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

/// Response sent when the selected backend could not be reached.
pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
}
