//! Live client set and per-client outbound queues

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::{RelayError, Result};

pub type ClientId = u64;

/// Message queued for a client's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Sending side of one connected client.
///
/// Messages go through a bounded queue drained by the client's own writer
/// task, so per-client order is preserved and a slow client never blocks
/// delivery to the others.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    peer: Option<SocketAddr>,
    tx: mpsc::Sender<Outbound>,
}

impl ClientHandle {
    pub fn new(id: ClientId, peer: Option<SocketAddr>, tx: mpsc::Sender<Outbound>) -> Self {
        Self { id, peer, tx }
    }

    /// Handle plus the receiving end its writer task drains.
    pub fn channel(
        id: ClientId,
        peer: Option<SocketAddr>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, peer, tx), rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Queue a message without waiting.
    pub fn send(&self, message: Outbound) -> Result<()> {
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => RelayError::delivery_failed(self.id, "outbound queue full"),
            TrySendError::Closed(_) => RelayError::delivery_failed(self.id, "connection writer gone"),
        })
    }
}

/// Result of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: Vec<ClientId>,
}

/// Set of open client connections.
///
/// Membership changes only through [`opened`](Self::opened) and
/// [`closed`](Self::closed), which connection tasks call concurrently; a
/// single lock serializes them. Broadcasts iterate a snapshot taken under the
/// lock, so clients may come and go mid-broadcast.
#[derive(Debug, Clone, Default)]
pub struct ClientSet {
    clients: Arc<Mutex<HashMap<ClientId, ClientHandle>>>,
    next_id: Arc<AtomicU64>,
}

impl ClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a new connection.
    pub fn next_id(&self) -> ClientId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register an open connection. Returns `false` if the id was already present.
    pub fn opened(&self, handle: ClientHandle) -> bool {
        let mut clients = self.clients.lock();
        if clients.contains_key(&handle.id) {
            return false;
        }
        clients.insert(handle.id, handle);
        true
    }

    /// Remove a closed connection. Unknown ids are a no-op.
    pub fn closed(&self, id: ClientId) -> bool {
        self.clients.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Copy of the current handles.
    pub fn snapshot(&self) -> Vec<ClientHandle> {
        self.clients.lock().values().cloned().collect()
    }

    /// Send `text` to every open client.
    pub fn broadcast(&self, text: &str) -> BroadcastReport {
        self.deliver(text, None)
    }

    /// Send `text` to every open client except `sender`.
    pub fn broadcast_except(&self, sender: ClientId, text: &str) -> BroadcastReport {
        self.deliver(text, Some(sender))
    }

    /// Ask every client's writer to close its connection.
    pub fn close_all(&self) -> usize {
        let clients = self.snapshot();
        for client in &clients {
            if let Err(e) = client.send(Outbound::Close) {
                debug!("Close request not queued: {}", e);
            }
        }
        clients.len()
    }

    fn deliver(&self, text: &str, skip: Option<ClientId>) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for client in self.snapshot() {
            if Some(client.id) == skip {
                continue;
            }
            match client.send(Outbound::Text(text.to_string())) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(client = client.id, "Broadcast delivery failed: {}", e);
                    report.failed.push(client.id);
                }
            }
        }

        report
    }
}
