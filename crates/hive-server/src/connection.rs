//! Per-connection identity and outbound frame handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique identifier for one accepted WebSocket connection.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new() -> Self {
        Self(format!("client_{}", Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cloneable sender half of a connection's outbound frame queue.
///
/// Every frame for a connection (responses, snapshot drains, pushed events)
/// travels through this one bounded queue, which is what gives per-session
/// delivery ordering. Enqueueing never blocks; a full or closed queue counts
/// the frame as dropped and reports failure to the caller.
#[derive(Clone)]
pub struct ClientHandle {
    tx: mpsc::Sender<Arc<String>>,
    dropped: Arc<AtomicU64>,
}

impl ClientHandle {
    pub fn new(tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue one pre-serialized frame.
    ///
    /// Returns `false` (and increments the drop counter) when the queue is
    /// full or the connection is gone.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize a value and enqueue it as one frame.
    pub fn send_json<T: Serialize>(&self, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.send(Arc::new(json)),
            Err(_) => false,
        }
    }

    /// Total frames dropped on this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Live connections, for counting and connection-scoped bookkeeping.
#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<ClientId, ClientHandle>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ClientId, handle: ClientHandle) {
        let _ = self.clients.insert(id, handle);
    }

    pub fn unregister(&self, id: &ClientId) {
        let _ = self.clients.remove(id);
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }
}
