//! Trailing-edge debounce for relayed messages
//!
//! While messages keep arriving faster than the window, nothing is relayed.
//! Once the senders have been quiet for a full window, the latest message is
//! fanned out to every client except the one that sent it.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::clients::{ClientId, ClientSet};

#[derive(Debug, Clone)]
struct Relayed {
    from: ClientId,
    text: String,
}

/// Latest-wins relay buffer shared by all connections of a server.
#[derive(Debug)]
pub struct RelayDebounce {
    latest: watch::Sender<Option<Relayed>>,
    task: JoinHandle<()>,
}

impl RelayDebounce {
    /// Start the flush task. It stops when `cancel` fires.
    pub fn spawn(clients: ClientSet, window: Duration, cancel: CancellationToken) -> Self {
        let (latest, rx) = watch::channel(None);
        let task = tokio::spawn(flush_loop(clients, rx, window, cancel));
        Self { latest, task }
    }

    /// Replace the pending message and restart the window.
    pub fn submit(&self, from: ClientId, text: String) {
        self.latest.send_replace(Some(Relayed { from, text }));
    }
}

impl Drop for RelayDebounce {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn flush_loop(
    clients: ClientSet,
    mut latest: watch::Receiver<Option<Relayed>>,
    window: Duration,
    cancel: CancellationToken,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let flush_at = deadline.unwrap_or_else(Instant::now);
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = latest.changed() => {
                if changed.is_err() {
                    break;
                }
                trace!("Relay window restarted");
                deadline = Some(Instant::now() + window);
            }
            _ = sleep_until(flush_at), if deadline.is_some() => {
                deadline = None;
                let pending = latest.borrow_and_update().clone();
                if let Some(Relayed { from, text }) = pending {
                    let report = clients.broadcast_except(from, &text);
                    debug!(client = from, delivered = report.delivered, "Relayed debounced message");
                }
            }
        }
    }
}
