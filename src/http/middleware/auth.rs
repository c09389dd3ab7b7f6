//! Auth gate middleware.
//! Rejects requests without an accepted credential before any relay logic runs.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::observability::metrics;
use crate::security::TokenSet;

/// State required for the auth gate.
#[derive(Debug, Clone)]
pub struct AuthGate {
    pub header: HeaderName,
    pub tokens: TokenSet,
}

impl AuthGate {
    pub fn new(header: HeaderName, tokens: TokenSet) -> Self {
        Self { header, tokens }
    }

    /// Pull the credential from the configured header, falling back to `Authorization: Bearer`.
    pub fn credential<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        if let Some(value) = headers.get(&self.header).and_then(|v| v.to_str().ok()) {
            return Some(value.trim());
        }
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
    }

    pub fn allows(&self, headers: &HeaderMap) -> bool {
        self.credential(headers)
            .is_some_and(|credential| self.tokens.authorize(credential))
    }
}

pub async fn auth_middleware(
    State(gate): State<AuthGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if gate.allows(request.headers()) {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "Rejected request without valid credential");
    metrics::record_auth_rejection();
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn gate() -> AuthGate {
        AuthGate::new(
            HeaderName::from_static("x-auth-token"),
            TokenSet::new(["valid-token-1"]),
        )
    }

    #[test]
    fn reads_configured_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-token", HeaderValue::from_static("valid-token-1"));
        assert!(gate().allows(&headers));
    }

    #[test]
    fn accepts_bearer_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer valid-token-1"),
        );
        assert!(gate().allows(&headers));
    }

    #[test]
    fn rejects_missing_and_unknown() {
        assert!(!gate().allows(&HeaderMap::new()));

        let mut headers = HeaderMap::new();
        headers.insert("x-auth-token", HeaderValue::from_static("nope"));
        assert!(!gate().allows(&headers));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("valid-token-1"));
        assert!(!gate().allows(&headers));
    }
}
