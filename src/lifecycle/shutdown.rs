//! Shutdown coordination for the proxy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::net::SessionTracker;

/// Process-wide shutdown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Accepting new connections.
    Running,
    /// Listener closed; open WebSocket sessions may still finish.
    Draining,
    /// Terminal.
    Stopped,
}

/// How the drain phase ended. Neither case is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every session finished within the bound.
    Graceful,
    /// The bound elapsed; `remaining` sessions were abandoned.
    Forced { remaining: usize },
}

/// Coordinator for graceful shutdown.
///
/// Holds the `Running → Draining → Stopped` state in a watch channel that any
/// task can wait on. Clones share the same state.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    state: Arc<watch::Sender<ShutdownState>>,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator in the `Running` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ShutdownState::Running);
        Self { state: Arc::new(tx) }
    }

    /// Begin graceful shutdown. Only the first call has an effect.
    pub fn trigger(&self) -> bool {
        let started = self.state.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = ShutdownState::Draining;
                true
            } else {
                false
            }
        });
        if started {
            tracing::info!("Shutdown requested, no longer accepting connections");
        }
        started
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    pub fn is_triggered(&self) -> bool {
        self.state() != ShutdownState::Running
    }

    /// Resolve once shutdown has been triggered.
    pub async fn triggered(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|state| *state != ShutdownState::Running).await;
    }

    /// Wait for active sessions up to `timeout`, then move to `Stopped`.
    ///
    /// Sessions still open at the bound are left to die with the process.
    pub async fn drain(&self, sessions: &SessionTracker, timeout: Duration) -> DrainOutcome {
        self.trigger();

        let active = sessions.active_count();
        tracing::info!(
            active_sessions = active,
            timeout_secs = timeout.as_secs_f64(),
            "Waiting for active WebSocket sessions to close"
        );

        let outcome = if sessions.wait_until_drained(timeout).await {
            tracing::info!("All WebSocket sessions closed, graceful shutdown complete");
            DrainOutcome::Graceful
        } else {
            let remaining = sessions.active_count();
            tracing::warn!(
                remaining_sessions = remaining,
                "Drain timeout reached, forcing shutdown"
            );
            DrainOutcome::Forced { remaining }
        };

        self.state.send_replace(ShutdownState::Stopped);
        tracing::info!("Server stopped");
        outcome
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
