//! WebSocket session tracking for graceful shutdown.
//!
//! # Responsibilities
//! - Count relays that have both sockets open
//! - Generate unique session IDs for tracing
//! - Let shutdown wait (bounded) until the count reaches zero

use std::pin::pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::observability::metrics;

/// Global atomic counter for session IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Inner {
    active: AtomicUsize,
    drained: Notify,
}

/// Tracks active WebSocket relays.
///
/// Cloning is cheap; all clones share one counter.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    inner: Arc<Inner>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session as active. The returned guard ends it on drop,
    /// including when the owning task errors or panics.
    pub fn begin(&self) -> SessionGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        metrics::record_session_opened();
        SessionGuard {
            inner: Arc::clone(&self.inner),
            id: SessionId::new(),
        }
    }

    /// Current number of active sessions.
    pub fn active_count(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Wait until no session is active or `timeout` elapses.
    ///
    /// Returns `true` when drained. Does not stop new sessions from starting.
    pub async fn wait_until_drained(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.drained()).await.is_ok()
    }

    async fn drained(&self) {
        loop {
            let mut notified = pin!(self.inner.drained.notified());
            // Register before checking so a decrement between the load and the await is not lost.
            notified.as_mut().enable();
            if self.active_count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Guard that tracks a session's lifetime.
/// Decrements the active count exactly once when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    inner: Arc<Inner>,
    id: SessionId,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let previous = self.inner.active.fetch_sub(1, Ordering::SeqCst);
        metrics::record_session_closed();
        if previous == 1 {
            self.inner.drained.notify_waiters();
        }
        tracing::trace!(session_id = %self.id, "Session released");
    }
}
