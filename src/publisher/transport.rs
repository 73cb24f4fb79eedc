//! Outbound transport used by the publisher

use futures::SinkExt;
use futures::stream::{SplitSink, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use crate::{RelayError, Result};

/// Longest a close handshake may wait on a relay that stopped reading.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(250);

/// Opens sessions to the relay.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    type Sink: PayloadSink;

    /// Open a new session. Called lazily by the publisher whenever it has no
    /// live session.
    async fn connect(&self) -> Result<Self::Sink>;

    /// Endpoint description for logs.
    fn endpoint(&self) -> &str;
}

/// One open session to the relay.
#[async_trait::async_trait]
pub trait PayloadSink: Send + 'static {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// The transport has reported closure; the session cannot be used again.
    fn is_terminated(&self) -> bool;

    /// Close the session. Closing twice is a no-op.
    async fn close(&mut self);
}

/// WebSocket connector for a `ws://` url.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    type Sink = WebSocketSink;

    async fn connect(&self) -> Result<WebSocketSink> {
        let (stream, response) = connect_async(self.url.as_str()).await.map_err(|e| {
            RelayError::connection_failed_with_source(&self.url, "handshake failed", Box::new(e))
        })?;
        info!(url = %self.url, status = %response.status(), "Connected to relay");
        Ok(WebSocketSink::new(stream))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a WebSocket session.
///
/// The read half is drained by a background task that marks the session
/// terminated as soon as the server closes it or the socket fails.
pub struct WebSocketSink {
    sink: SplitSink<WsStream, Message>,
    terminated: Arc<AtomicBool>,
    closed: bool,
    reader: JoinHandle<()>,
}

impl WebSocketSink {
    fn new(stream: WsStream) -> Self {
        let (sink, mut incoming) = stream.split();
        let terminated = Arc::new(AtomicBool::new(false));

        let reader_flag = Arc::clone(&terminated);
        let reader = tokio::spawn(async move {
            while let Some(message) = incoming.next().await {
                match message {
                    Ok(Message::Text(text)) => debug!(%text, "Message from relay"),
                    Ok(Message::Close(frame)) => {
                        info!(?frame, "Relay closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Relay connection failed: {}", e);
                        break;
                    }
                }
            }
            reader_flag.store(true, Ordering::Release);
        });

        Self { sink, terminated, closed: false, reader }
    }
}

#[async_trait::async_trait]
impl PayloadSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.is_terminated() {
            return Err(RelayError::send_failed("connection terminated", None));
        }

        if let Err(e) = self.sink.send(Message::Text(text)).await {
            self.terminated.store(true, Ordering::Release);
            return Err(RelayError::send_failed("websocket send failed", Some(Box::new(e))));
        }
        Ok(())
    }

    fn is_terminated(&self) -> bool {
        self.closed || self.terminated.load(Ordering::Acquire)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if !self.terminated.swap(true, Ordering::AcqRel) {
            match tokio::time::timeout(CLOSE_TIMEOUT, self.sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Error while closing relay connection: {}", e),
                Err(_) => debug!("Relay did not accept the close frame, abandoning connection"),
            }
        }
        self.reader.abort();
    }
}

impl Drop for WebSocketSink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
