//! Demo backends for exercising the proxy locally.
//!
//! Starts one server per configured backend. `GET /` greets with the backend
//! name and `GET /ws` echoes every WebSocket message back with its type.

use std::future::IntoFuture;
use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use clap::Parser;
use relay_proxy::config::{read_config, BackendConfig};
use relay_proxy::lifecycle::{signals, ShutdownCoordinator};
use relay_proxy::load_balancer::Backend;
use relay_proxy::observability::logging;
use tokio::task::JoinSet;

/// Per-server bound on graceful shutdown.
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "demo-backend")]
#[command(about = "Start the backends listed in a relay-proxy config", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging("info");

    let config = read_config(&cli.config)?;
    if config.backends.is_empty() {
        return Err("no backends configured".into());
    }

    let shutdown = ShutdownCoordinator::new();
    let mut servers = JoinSet::new();
    for entry in config.backends {
        servers.spawn(serve_backend(entry, shutdown.clone()));
    }

    signals::termination_signal().await;
    tracing::info!("Shutting down servers...");
    shutdown.trigger();

    while let Some(result) = servers.join_next().await {
        if let Ok(Err(e)) = result {
            tracing::error!(error = %e, "Backend server failed");
        }
    }
    tracing::info!("Servers gracefully stopped.");
    Ok(())
}

async fn serve_backend(entry: BackendConfig, shutdown: ShutdownCoordinator) -> std::io::Result<()> {
    let backend = Backend::from_config(&entry)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let name = backend.name.clone();

    let app = Router::new()
        .route("/", get(greet))
        .route("/ws", get(echo_upgrade))
        .with_state(name.clone());

    let listener = tokio::net::TcpListener::bind(backend.authority()).await?;
    tracing::info!(name = %name, address = %listener.local_addr()?, "Backend started");

    let signal = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal.triggered().await });
    let mut server = std::pin::pin!(server.into_future());

    tokio::select! {
        result = &mut server => return result,
        _ = shutdown.triggered() => {}
    }

    tracing::info!(name = %name, "Backend shutting down...");
    match tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, server).await {
        Ok(result) => {
            tracing::info!(name = %name, "Backend stopped gracefully.");
            result
        }
        Err(_) => {
            tracing::warn!(name = %name, "Backend shutdown timed out");
            Ok(())
        }
    }
}

async fn greet(State(name): State<String>) -> String {
    tracing::info!(name = %name, "Received a request");
    format!("Hello from {}!", name)
}

async fn echo_upgrade(State(name): State<String>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| echo(socket, name))
}

async fn echo(mut socket: WebSocket, name: String) {
    tracing::info!(name = %name, "WebSocket connection established");
    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(Message::Close(_)) => break,
            Ok(message @ (Message::Text(_) | Message::Binary(_))) => message,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Error reading message");
                break;
            }
        };
        if let Err(e) = socket.send(message).await {
            tracing::warn!(name = %name, error = %e, "Error writing message");
            break;
        }
    }
    tracing::info!(name = %name, "WebSocket connection closed");
}
