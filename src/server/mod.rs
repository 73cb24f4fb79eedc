//! Relay server: accepts WebSocket clients and fans messages out to them.
//!
//! Every connection gets its own task. Text received from a client is echoed
//! back to it and relayed to every other client (both configurable), which is
//! how payloads from a publisher reach the listeners. Relaying can be
//! debounced so that only the last message of a burst is fanned out.

mod clients;
mod debounce;

pub use clients::{BroadcastReport, ClientHandle, ClientId, ClientSet, Outbound};
pub use debounce::RelayDebounce;

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::{RelayError, Result};

/// How long shutdown waits for client connections to finish closing.
const CLIENT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

struct ServerState {
    clients: ClientSet,
    config: ServerConfig,
    cancel: CancellationToken,
    connections: TaskTracker,
    relay_debounce: Option<RelayDebounce>,
}

/// Builder for the relay server.
#[derive(Debug, Clone)]
pub struct RelayServerBuilder {
    config: ServerConfig,
    clients: ClientSet,
}

impl RelayServerBuilder {
    pub fn new(config: ServerConfig) -> Self {
        Self { config, clients: ClientSet::new() }
    }

    /// Bind the listener and start serving. Returns once the socket is bound.
    pub async fn spawn(self) -> Result<RelayServerHandle> {
        let listen = self.config.listen;
        let listener =
            TcpListener::bind(listen).await.map_err(|e| RelayError::Bind { addr: listen, source: e })?;
        let local_addr =
            listener.local_addr().map_err(|e| RelayError::Bind { addr: listen, source: e })?;
        let path = self.config.path.clone();
        info!(address = %local_addr, %path, "Relay server listening");

        let cancel = CancellationToken::new();
        let connections = TaskTracker::new();
        let window = self.config.relay_debounce();
        let relay_debounce = if window.is_zero() {
            None
        } else {
            info!(window_ms = window.as_millis() as u64, "Relay debounce enabled");
            Some(RelayDebounce::spawn(self.clients.clone(), window, cancel.clone()))
        };
        let state = Arc::new(ServerState {
            clients: self.clients.clone(),
            config: self.config,
            cancel: cancel.clone(),
            connections: connections.clone(),
            relay_debounce,
        });

        let app = Router::new().route(&path, get(upgrade_handler)).with_state(state);

        let shutdown = cancel.clone();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(shutdown.cancelled_owned());
            if let Err(err) = server.await {
                warn!(error = %err, "Relay server exited with error");
            }
        });

        Ok(RelayServerHandle {
            address: local_addr,
            path,
            clients: self.clients,
            cancel,
            connections,
            task: Some(task),
        })
    }
}

/// Handle for the running relay server.
pub struct RelayServerHandle {
    address: SocketAddr,
    path: String,
    clients: ClientSet,
    cancel: CancellationToken,
    connections: TaskTracker,
    task: Option<JoinHandle<()>>,
}

impl RelayServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// `ws://` url clients connect to.
    pub fn url(&self) -> String {
        format!("ws://{}{}", self.address, self.path)
    }

    pub fn clients(&self) -> &ClientSet {
        &self.clients
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Send `text` to every connected client.
    pub fn broadcast(&self, text: &str) -> BroadcastReport {
        self.clients.broadcast(text)
    }

    /// Stop accepting connections and close every client.
    ///
    /// Calling it again after the server has stopped is a no-op.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        info!(clients = self.clients.len(), "Shutting down relay server");
        self.cancel.cancel();
        self.clients.close_all();

        task.await.map_err(|e| RelayError::source_failed(format!("server task failed: {e}")))?;

        self.connections.close();
        if tokio::time::timeout(CLIENT_CLOSE_TIMEOUT, self.connections.wait()).await.is_err() {
            warn!(remaining = self.clients.len(), "Timed out waiting for clients to close");
        }
        Ok(())
    }
}

impl Drop for RelayServerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<ServerState>>,
) -> axum::response::Response {
    let connections = state.connections.clone();
    ws.on_upgrade(move |socket| connections.track_future(client_loop(socket, peer, state)))
}

async fn client_loop(socket: WebSocket, peer: SocketAddr, state: Arc<ServerState>) {
    let (handle, outbound) =
        ClientHandle::channel(state.clients.next_id(), Some(peer), state.config.client_queue);
    let id = handle.id();
    state.clients.opened(handle.clone());
    info!(client = id, %peer, clients = state.clients.len(), "Client connected");

    if let Some(greeting) = &state.config.greeting {
        if let Err(e) = handle.send(Outbound::Text(greeting.clone())) {
            debug!(client = id, "Greeting not queued: {}", e);
        }
    }

    let (sink, mut incoming) = socket.split();
    let writer = tokio::spawn(writer_loop(id, sink, outbound));

    loop {
        tokio::select! {
            _ = state.cancel.cancelled() => {
                if let Err(e) = handle.send(Outbound::Close) {
                    debug!(client = id, "Close not queued: {}", e);
                }
                break;
            }
            message = incoming.next() => {
                let Some(Ok(message)) = message else {
                    break;
                };

                match message {
                    Message::Text(text) => {
                        debug!(client = id, %text, "Message from client");
                        if state.config.echo {
                            if let Err(e) = handle.send(Outbound::Text(text.clone())) {
                                warn!(client = id, "Echo failed: {}", e);
                            }
                        }
                        if state.config.relay {
                            match &state.relay_debounce {
                                Some(debounce) => debounce.submit(id, text),
                                None => {
                                    state.clients.broadcast_except(id, &text);
                                }
                            }
                        }
                    }
                    Message::Binary(data) => {
                        debug!(client = id, bytes = data.len(), "Ignoring binary message");
                    }
                    // Pongs are queued by the websocket layer itself.
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Close(_) => break,
                }
            }
        }
    }

    state.clients.closed(id);
    drop(handle);
    if writer.await.is_err() {
        debug!(client = id, "Writer task aborted");
    }
    info!(client = id, clients = state.clients.len(), "Client disconnected");
}

async fn writer_loop(
    id: ClientId,
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
) {
    while let Some(message) = outbound.recv().await {
        match message {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(client = id, "Send failed, writer stopping: {}", e);
                    break;
                }
            }
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}
