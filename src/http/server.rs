//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (auth gate, tracing, request ID)
//! - Bind server to listener
//! - Forward requests and WebSocket sessions to backends
//! - Drain WebSocket sessions on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::HeaderName,
    middleware,
    routing::{any, get},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::middleware::{auth_middleware, AuthGate};
use crate::http::proxy::proxy_handler;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::websocket::websocket_handler;
use crate::lifecycle::startup::{self, StartupError};
use crate::lifecycle::{DrainOutcome, ShutdownCoordinator};
use crate::load_balancer::{BackendPool, RoundRobin};
use crate::net::SessionTracker;
use crate::security::TokenSet;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub selector: Arc<RoundRobin>,
    pub client: Client<HttpConnector, Body>,
    pub sessions: SessionTracker,
    pub backend_ws_path: Arc<str>,
}

/// HTTP server for the relay proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    selector: Arc<RoundRobin>,
    sessions: SessionTracker,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Configuration is validated first; an empty backend pool is rejected here.
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        startup::validate(&config)?;

        let pool = BackendPool::from_config(&config.backends)?;
        let selector = Arc::new(RoundRobin::new(pool));
        let sessions = SessionTracker::new();

        // Validation guarantees the header name parses.
        let header = HeaderName::from_bytes(config.auth.header.as_bytes())
            .unwrap_or_else(|_| HeaderName::from_static("x-auth-token"));
        let gate = AuthGate::new(header, TokenSet::new(config.auth.tokens.iter().cloned()));

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            selector: selector.clone(),
            client,
            sessions: sessions.clone(),
            backend_ws_path: config.websocket.backend_path.as_str().into(),
        };

        let router = Self::build_router(&config, state, gate);
        Ok(Self {
            router,
            config,
            selector,
            sessions,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The auth gate is a route layer, so it runs before either relay handler.
    fn build_router(config: &ProxyConfig, state: AppState, gate: AuthGate) -> Router {
        Router::new()
            .route(&config.websocket.path, get(websocket_handler))
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .route_layer(middleware::from_fn_with_state(gate, auth_middleware))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// Run the server until `shutdown` is triggered, then drain.
    ///
    /// Returns how the drain ended. Only listener failures are errors.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: ShutdownCoordinator,
    ) -> Result<DrainOutcome, std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.selector.pool().len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let signal = shutdown.clone();
        let mut serve = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.triggered().await })
                .await
        });

        let mut serve_finished = false;
        tokio::select! {
            result = &mut serve => {
                serve_finished = true;
                if !shutdown.is_triggered() {
                    let error = match result {
                        Ok(Err(e)) => e,
                        Ok(Ok(())) => std::io::Error::other("HTTP server exited unexpectedly"),
                        Err(e) => std::io::Error::other(e),
                    };
                    tracing::error!(error = %error, "HTTP server failed");
                    return Err(error);
                }
            }
            _ = shutdown.triggered() => {}
        }

        // Plain HTTP requests still in flight get the same bound as the sessions.
        let drain_timeout = Duration::from_secs(self.config.shutdown.drain_timeout_secs);
        let http = async {
            serve_finished || tokio::time::timeout(drain_timeout, &mut serve).await.is_ok()
        };
        let (outcome, http_drained) =
            tokio::join!(shutdown.drain(&self.sessions, drain_timeout), http);
        if !http_drained {
            tracing::warn!("HTTP connections still open at drain timeout");
        }

        Ok(outcome)
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn selector(&self) -> &Arc<RoundRobin> {
        &self.selector
    }

    /// Handle on the active WebSocket session count.
    pub fn sessions(&self) -> SessionTracker {
        self.sessions.clone()
    }
}
