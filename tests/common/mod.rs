//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use relay_proxy::config::{BackendConfig, ProxyConfig};
use relay_proxy::lifecycle::{DrainOutcome, ShutdownCoordinator};
use relay_proxy::net::SessionTracker;
use relay_proxy::HttpServer;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

pub const TOKEN: &str = "valid-token-1";

pub type ClientSocket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Clone)]
struct BackendState {
    name: &'static str,
    hits: Arc<AtomicUsize>,
}

/// A running mock backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn config(&self, name: &str) -> BackendConfig {
        BackendConfig::new(name, format!("http://{}", self.addr))
    }
}

/// Start a backend that answers every HTTP request with its name and echoes WebSocket messages.
///
/// The request it saw is reported back in `x-seen-*` headers.
pub async fn start_mock_backend(name: &'static str) -> MockBackend {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = BackendState {
        name,
        hits: hits.clone(),
    };
    let app = Router::new()
        .route("/ws", get(echo_upgrade))
        .route("/ws/close", get(close_upgrade))
        .route("/ws/drop", get(drop_upgrade))
        .route("/", any(describe))
        .route("/{*path}", any(describe))
        .with_state(state);
    let addr = serve(app).await;
    MockBackend { addr, hits }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn describe(State(state): State<BackendState>, uri: Uri, headers: HeaderMap) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let seen = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    (
        [
            ("x-seen-uri", uri.to_string()),
            ("x-seen-host", seen("host")),
            ("x-seen-forwarded-for", seen("x-forwarded-for")),
        ],
        state.name,
    )
        .into_response()
}

async fn echo_upgrade(State(state): State<BackendState>, ws: WebSocketUpgrade) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(echo)
}

async fn echo(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(_) | Message::Binary(_) => {
                if socket.send(message).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn close_upgrade(State(state): State<BackendState>, ws: WebSocketUpgrade) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(|mut socket| async move {
        let frame = CloseFrame {
            code: 4000,
            reason: "backend done".into(),
        };
        let _ = socket.send(Message::Close(Some(frame))).await;
        // Wait for the close reply before dropping.
        while let Some(Ok(_)) = socket.recv().await {}
    })
}

async fn drop_upgrade(State(state): State<BackendState>, ws: WebSocketUpgrade) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(|socket| async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        // Gone without a close frame.
        drop(socket);
    })
}

/// An address nothing listens on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Proxy configuration over `backends`, bound to an ephemeral port.
pub fn proxy_config(backends: Vec<BackendConfig>) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.backends = backends;
    config.auth.tokens = vec![TOKEN.to_string(), "valid-token-2".to_string()];
    config.shutdown.drain_timeout_secs = 1;
    config
}

/// A proxy running in the background.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: ShutdownCoordinator,
    pub sessions: SessionTracker,
    pub handle: JoinHandle<std::io::Result<DrainOutcome>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let sessions = server.sessions();
    let shutdown = ShutdownCoordinator::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    TestProxy {
        addr,
        shutdown,
        sessions,
        handle,
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Open a WebSocket through the proxy, optionally presenting `token`.
pub async fn connect_ws(
    url: &str,
    token: Option<&str>,
) -> Result<ClientSocket, tokio_tungstenite::tungstenite::Error> {
    let mut request = url.into_client_request()?;
    if let Some(token) = token {
        request
            .headers_mut()
            .insert("x-auth-token", token.parse().unwrap());
    }
    let (socket, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(socket)
}

/// Poll until the tracker reports `expected` sessions, or panic after a few seconds.
pub async fn wait_for_sessions(sessions: &SessionTracker, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while sessions.active_count() != expected {
        if tokio::time::Instant::now() > deadline {
            panic!(
                "expected {} active sessions, still {}",
                expected,
                sessions.active_count()
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
