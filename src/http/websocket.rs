//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Complete upgrade handshake with client
//! - Establish WebSocket connection to backend
//! - Bidirectional message forwarding
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket messages ────→ Proxy ←──── WebSocket messages ────→ Backend
//! ```
//!
//! # Session lifecycle
//! ```text
//! Upgrading → Dialing → Relaying → Closing
//!     │          │          │
//!     │          │          └─ counted in SessionTracker from here until drop
//!     │          └─ failure: client closed with 1011, never counted
//!     └─ failure: rejected by axum, nothing else happens
//! ```
//!
//! # Design Decisions
//! - Two pump tasks share one cancellation token; the first to stop cancels the other
//! - Text and binary messages keep their type and bytes
//! - Ping/pong is answered per hop and not forwarded
//! - Close frames propagated in both directions

use std::fmt;
use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use futures_util::{
    future::{self, Either},
    Sink, SinkExt, Stream, StreamExt,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    tungstenite::{
        self,
        client::IntoClientRequest,
        protocol::{frame::coding::CloseCode, CloseFrame as BackendCloseFrame},
        Message as BackendMessage,
    },
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::http::request::X_REQUEST_ID;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Socket to a backend WebSocket endpoint.
pub type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on flushing a close handshake to a peer that stopped reading.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Which way a pump moves messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToBackend => f.write_str("client->backend"),
            Direction::BackendToClient => f.write_str("backend->client"),
        }
    }
}

/// How a relay ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// A peer sent a close frame; `direction` is the pump that received it.
    Closed { direction: Direction, code: Option<u16> },
    /// Stopped by the other pump.
    Cancelled,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to dial backend {url}: {source}")]
    Dial {
        url: Url,
        #[source]
        source: tungstenite::Error,
    },

    #[error("{direction}: read failed: {reason}")]
    Read { direction: Direction, reason: String },

    #[error("{direction}: write failed: {reason}")]
    Write { direction: Direction, reason: String },

    #[error("{direction}: peer disconnected without a close frame")]
    Disconnected { direction: Direction },

    #[error("relay task aborted: {0}")]
    Aborted(String),
}

/// Client handshake headers carried over to the backend handshake.
#[derive(Debug, Clone, Default)]
pub struct ForwardHeaders {
    pub origin: Option<HeaderValue>,
    pub request_id: Option<HeaderValue>,
}

impl ForwardHeaders {
    pub fn from_client(headers: &HeaderMap) -> Self {
        Self {
            origin: headers.get(header::ORIGIN).cloned(),
            request_id: headers.get(X_REQUEST_ID).cloned(),
        }
    }
}

/// `GET /ws`: upgrade the client, then relay to the next backend.
pub async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Response {
    let forward = ForwardHeaders::from_client(&headers);
    ws.on_failed_upgrade(|e| tracing::warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| relay_session(socket, state, forward))
}

/// Drive one session from a freshly upgraded client socket to the end.
pub async fn relay_session(mut client: WebSocket, state: AppState, forward: ForwardHeaders) {
    let backend = state.selector.next();
    let url = backend.websocket_url(&state.backend_ws_path);

    tracing::debug!(backend = %backend.name, url = %url, "Dialing backend WebSocket");

    let upstream = match dial_backend(&url, &forward).await {
        Ok(socket) => socket,
        Err(e) => {
            tracing::warn!(backend = %backend.name, error = %e, "Backend WebSocket dial failed");
            metrics::record_dial_failure(&backend.name);
            let frame = CloseFrame {
                code: close_code::ERROR,
                reason: "backend unavailable".into(),
            };
            let _ = tokio::time::timeout(CLOSE_GRACE, client.send(Message::Close(Some(frame)))).await;
            return;
        }
    };

    let guard = state.sessions.begin();
    tracing::info!(
        session_id = %guard.id(),
        backend = %backend.name,
        active = state.sessions.active_count(),
        "WebSocket session established"
    );

    match relay(client, upstream).await {
        Ok(end) => {
            tracing::info!(session_id = %guard.id(), outcome = ?end, "WebSocket session closed");
        }
        Err(e) => {
            metrics::record_session_error();
            tracing::warn!(session_id = %guard.id(), error = %e, "WebSocket session ended abnormally");
        }
    }
}

/// Open the backend WebSocket, forwarding the client's Origin.
pub async fn dial_backend(url: &Url, forward: &ForwardHeaders) -> Result<BackendSocket, RelayError> {
    let dial_error = |source| RelayError::Dial {
        url: url.clone(),
        source,
    };

    let mut request = url.as_str().into_client_request().map_err(dial_error)?;
    if let Some(origin) = &forward.origin {
        request.headers_mut().insert(header::ORIGIN, origin.clone());
    }
    if let Some(id) = &forward.request_id {
        request.headers_mut().insert(X_REQUEST_ID, id.clone());
    }

    let (socket, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(dial_error)?;
    Ok(socket)
}

/// Pump messages both ways until either side stops. The first pump to stop decides the outcome.
pub async fn relay(client: WebSocket, backend: BackendSocket) -> Result<RelayEnd, RelayError> {
    let cancel = CancellationToken::new();
    let (client_tx, client_rx) = client.split();
    let (backend_tx, backend_rx) = backend.split();

    let upstream = tokio::spawn(pump(
        Direction::ClientToBackend,
        client_rx,
        backend_tx,
        client_to_backend,
        cancel.clone(),
    ));
    let downstream = tokio::spawn(pump(
        Direction::BackendToClient,
        backend_rx,
        client_tx,
        backend_to_client,
        cancel.clone(),
    ));

    let (first, rest) = match future::select(upstream, downstream).await {
        Either::Left((result, other)) | Either::Right((result, other)) => (result, other),
    };
    cancel.cancel();
    // The other pump's outcome is discarded once it has released its sockets.
    let _ = rest.await;

    match first {
        Ok(outcome) => outcome,
        Err(e) => Err(RelayError::Aborted(e.to_string())),
    }
}

/// What to do with one message read from a source.
enum Step<M> {
    Forward(M),
    Close(M, Option<u16>),
    Skip,
}

async fn pump<Src, Snk, In, Out, E>(
    direction: Direction,
    mut source: Src,
    mut sink: Snk,
    translate: fn(In) -> Step<Out>,
    cancel: CancellationToken,
) -> Result<RelayEnd, RelayError>
where
    Src: Stream<Item = Result<In, E>> + Unpin,
    Snk: Sink<Out> + Unpin,
    Snk::Error: fmt::Display,
    E: fmt::Display,
{
    // Cancels the sibling on every exit path, unwinding included.
    let _stop_sibling = cancel.clone().drop_guard();

    let outcome = loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break Ok(RelayEnd::Cancelled),
            next = source.next() => next,
        };

        match next.map(|r| r.map(translate)) {
            Some(Ok(Step::Forward(message))) => {
                let sent = tokio::select! {
                    _ = cancel.cancelled() => break Ok(RelayEnd::Cancelled),
                    sent = sink.send(message) => sent,
                };
                if let Err(e) = sent {
                    break Err(RelayError::Write {
                        direction,
                        reason: e.to_string(),
                    });
                }
            }
            Some(Ok(Step::Close(message, code))) => {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::timeout(CLOSE_GRACE, sink.send(message)) => {}
                }
                break Ok(RelayEnd::Closed { direction, code });
            }
            Some(Ok(Step::Skip)) => {}
            Some(Err(e)) => {
                break Err(RelayError::Read {
                    direction,
                    reason: e.to_string(),
                })
            }
            None => break Err(RelayError::Disconnected { direction }),
        }
    };

    let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
    outcome
}

fn client_to_backend(message: Message) -> Step<BackendMessage> {
    match message {
        Message::Text(text) => Step::Forward(BackendMessage::Text(text.as_str().into())),
        Message::Binary(data) => Step::Forward(BackendMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) => Step::Skip,
        Message::Close(frame) => {
            let code = frame.as_ref().map(|f| f.code);
            let frame = frame.map(|f| BackendCloseFrame {
                code: CloseCode::from(f.code),
                reason: f.reason.as_str().into(),
            });
            Step::Close(BackendMessage::Close(frame), code)
        }
    }
}

fn backend_to_client(message: BackendMessage) -> Step<Message> {
    match message {
        BackendMessage::Text(text) => Step::Forward(Message::Text(text.as_str().into())),
        BackendMessage::Binary(data) => Step::Forward(Message::Binary(data)),
        BackendMessage::Ping(_) | BackendMessage::Pong(_) | BackendMessage::Frame(_) => Step::Skip,
        BackendMessage::Close(frame) => {
            let code = frame.as_ref().map(|f| u16::from(f.code));
            let frame = frame.map(|f| CloseFrame {
                code: u16::from(f.code),
                reason: f.reason.as_str().into(),
            });
            Step::Close(Message::Close(frame), code)
        }
    }
}
