//! Publisher client: one outbound connection, rate limited, reconnect on demand.
//!
//! Publishing is best-effort telemetry. A payload is either sent, dropped
//! because it arrived inside the minimum send interval, or dropped because the
//! relay is unreachable. Nothing is queued or retried: the next call simply
//! carries newer data.
//!
//! Reconnection happens lazily inside [`Publisher::publish`], so a call made
//! while the relay is down may take up to the configured connect timeout. A
//! relay that accepts the connection but stops reading costs at most the send
//! timeout plus a short close attempt; the session is then abandoned and the
//! payload dropped.

mod transport;

pub use transport::{Connector, PayloadSink, WebSocketConnector, WebSocketSink};

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::PublisherConfig;
use crate::types::JointPayload;
use crate::{RelayError, Result};

/// Connection lifecycle of a [`Publisher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What happened to one [`Publisher::publish`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Sent,
    /// Inside the minimum send interval
    Throttled,
    /// No connection could be used
    Dropped,
}

/// Counters for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub sent: u64,
    pub throttled: u64,
    pub dropped: u64,
    pub connects: u64,
}

/// Single-writer client that pushes payloads to the relay.
pub struct Publisher<C: Connector = WebSocketConnector> {
    connector: C,
    sink: Option<C::Sink>,
    state: ConnectionState,
    min_interval: Duration,
    connect_timeout: Duration,
    send_timeout: Duration,
    last_sent_at: Option<Instant>,
    stats: PublisherStats,
}

impl Publisher<WebSocketConnector> {
    /// WebSocket publisher for `config.url`. Does not connect yet.
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self::new(WebSocketConnector::new(config.url.clone()), config)
    }

    /// Create a publisher and make one eager connection attempt.
    ///
    /// A failed attempt is logged and the publisher starts disconnected; the
    /// next publish retries.
    pub async fn connect(config: &PublisherConfig) -> Self {
        let mut publisher = Self::from_config(config);
        if !publisher.ensure_connected().await {
            warn!(url = %config.url, "Relay unavailable at startup, continuing without it");
        }
        publisher
    }
}

impl<C: Connector> Publisher<C> {
    pub fn new(connector: C, config: &PublisherConfig) -> Self {
        Self {
            connector,
            sink: None,
            state: ConnectionState::Disconnected,
            min_interval: config.min_interval(),
            connect_timeout: config.connect_timeout(),
            send_timeout: config.send_timeout(),
            last_sent_at: None,
            stats: PublisherStats::default(),
        }
    }

    /// Current state, accounting for a closure the transport reported since
    /// the last call.
    pub fn state(&self) -> ConnectionState {
        match (&self.state, &self.sink) {
            (ConnectionState::Connected, Some(sink)) if sink.is_terminated() => {
                ConnectionState::Disconnected
            }
            (state, _) => *state,
        }
    }

    pub fn stats(&self) -> PublisherStats {
        self.stats
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Make sure a live session exists, reconnecting if needed.
    ///
    /// Returns `false` if the connect attempt failed or timed out.
    pub async fn ensure_connected(&mut self) -> bool {
        if let Some(sink) = &self.sink {
            if !sink.is_terminated() {
                self.state = ConnectionState::Connected;
                return true;
            }
            debug!(endpoint = self.connector.endpoint(), "Relay connection terminated, reconnecting");
        }

        if let Some(mut stale) = self.sink.take() {
            stale.close().await;
        }

        self.state = ConnectionState::Connecting;
        let attempt = tokio::time::timeout(self.connect_timeout, self.connector.connect()).await;
        let result = match attempt {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout { duration: self.connect_timeout }),
        };

        match result {
            Ok(sink) => {
                self.sink = Some(sink);
                self.state = ConnectionState::Connected;
                self.stats.connects += 1;
                true
            }
            Err(e) => {
                warn!(endpoint = self.connector.endpoint(), "Relay connect failed: {}", e);
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    /// Send a payload unless it falls inside the minimum send interval.
    ///
    /// Transport failures are not errors: they drop the payload and leave the
    /// publisher disconnected until the next call. The only error is a payload
    /// that cannot be serialized.
    pub async fn publish(&mut self, payload: &JointPayload) -> Result<PublishOutcome> {
        let now = Instant::now();
        if let Some(last) = self.last_sent_at {
            if now.saturating_duration_since(last) < self.min_interval {
                self.stats.throttled += 1;
                trace!("Payload throttled");
                return Ok(PublishOutcome::Throttled);
            }
        }

        let text = payload.to_json()?;

        if !self.ensure_connected().await {
            self.stats.dropped += 1;
            return Ok(PublishOutcome::Dropped);
        }

        // A relay that stops reading fills the socket buffer; bound the wait.
        let sent = match self.sink.as_mut() {
            Some(sink) => match tokio::time::timeout(self.send_timeout, sink.send_text(text)).await {
                Ok(result) => result,
                Err(_) => Err(RelayError::Timeout { duration: self.send_timeout }),
            },
            None => Err(RelayError::send_failed("no connection", None)),
        };

        match sent {
            Ok(()) => {
                self.last_sent_at = Some(now);
                self.stats.sent += 1;
                trace!(joints = payload.len(), "Payload sent");
                Ok(PublishOutcome::Sent)
            }
            Err(e) => {
                warn!(endpoint = self.connector.endpoint(), "Dropping payload: {}", e);
                if let Some(mut sink) = self.sink.take() {
                    sink.close().await;
                }
                self.state = ConnectionState::Disconnected;
                self.stats.dropped += 1;
                Ok(PublishOutcome::Dropped)
            }
        }
    }

    /// Close the connection. Safe to call any number of times.
    pub async fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.close().await;
            info!(
                endpoint = self.connector.endpoint(),
                sent = self.stats.sent,
                dropped = self.stats.dropped,
                "Publisher closed"
            );
        }
        self.state = ConnectionState::Disconnected;
    }
}
