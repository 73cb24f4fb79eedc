//! Configuration for the relay server and the publishing pipeline.
//!
//! Configuration is read from YAML. Every field has a default, so an empty
//! document (or a missing section) yields the stock setup: relay on
//! `127.0.0.1:9001/ws`, two-second absence window, joints 2 and 3 projected
//! into a 640×480 frame, no publish throttle.
//!
//! ```rust
//! use skeleton_relay::RelayConfig;
//!
//! let config = RelayConfig::from_yaml_str(
//!     "publisher:\n  min_interval_ms: 100\nextractor:\n  joints: [3, 7, 11]\n",
//! )
//! .unwrap();
//! assert_eq!(config.publisher.min_interval().as_millis(), 100);
//! assert_eq!(config.server.listen.port(), 9001);
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::types::{JointId, UpdateRate};
use crate::{RelayError, Result};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:9001";
pub const DEFAULT_PATH: &str = "/ws";
pub const DEFAULT_URL: &str = "ws://127.0.0.1:9001/ws";

/// Environment variable the binaries read the config file path from.
pub const CONFIG_ENV: &str = "SKELETON_RELAY_CONFIG";

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub publisher: PublisherConfig,
    pub tracker: TrackerConfig,
    pub extractor: ExtractorConfig,
    pub render: RenderConfig,
}

impl RelayConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: RelayConfig =
            if yaml.trim().is_empty() { RelayConfig::default() } else { serde_yaml_ng::from_str(yaml)? };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| RelayError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Load from the file named by [`CONFIG_ENV`], or defaults when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.server.path.starts_with('/') {
            return Err(RelayError::config(format!(
                "server.path must start with '/', got '{}'",
                self.server.path
            )));
        }
        if self.publisher.send_timeout_ms == 0 || self.publisher.connect_timeout_ms == 0 {
            return Err(RelayError::config("publisher timeouts must be non-zero"));
        }
        if self.server.client_queue == 0 {
            return Err(RelayError::config("server.client_queue must be at least 1"));
        }
        if self.extractor.frame_width == 0 || self.extractor.frame_height == 0 {
            return Err(RelayError::config("extractor frame size must be non-zero"));
        }
        if self.extractor.frame_width > i32::MAX as u32 / 2
            || self.extractor.frame_height > i32::MAX as u32 / 2
        {
            return Err(RelayError::config("extractor frame size is out of range"));
        }
        // The transport is built without TLS support.
        if !self.publisher.url.starts_with("ws://") {
            return Err(RelayError::config(format!(
                "publisher.url must be a ws:// url, got '{}'",
                self.publisher.url
            )));
        }
        Ok(())
    }
}

/// Relay server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub path: String,
    /// Outbound messages buffered per client before deliveries to it fail
    pub client_queue: usize,
    /// Send every received text message back to its sender
    pub echo: bool,
    /// Forward every received text message to the other clients
    pub relay: bool,
    /// Text sent to each client right after it connects
    pub greeting: Option<String>,
    /// Trailing-edge window for relayed text; only the latest message of a
    /// burst is fanned out. Zero relays every message immediately.
    pub relay_debounce_ms: u64,
}

impl ServerConfig {
    pub fn relay_debounce(&self) -> Duration {
        Duration::from_millis(self.relay_debounce_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 9001)),
            path: DEFAULT_PATH.to_string(),
            client_queue: 64,
            echo: true,
            relay: true,
            greeting: None,
            relay_debounce_ms: 0,
        }
    }
}

/// Publisher client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublisherConfig {
    pub url: String,
    pub min_interval_ms: u64,
    pub connect_timeout_ms: u64,
    /// Longest a single send may wait on a relay that stopped reading
    pub send_timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            min_interval_ms: 0,
            connect_timeout_ms: 500,
            send_timeout_ms: 500,
        }
    }
}

impl PublisherConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Self::default() }
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_rate(self, rate: UpdateRate) -> Self {
        self.with_min_interval(rate.min_interval())
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Detection tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    pub absence_threshold_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { absence_threshold_ms: 2000 }
    }
}

impl TrackerConfig {
    pub fn absence_threshold(&self) -> Duration {
        Duration::from_millis(self.absence_threshold_ms)
    }
}

/// Payload extractor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    pub frame_width: u32,
    pub frame_height: u32,
    pub joints: Vec<JointId>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            joints: vec![JointId::SHOULDER_CENTER, JointId::HEAD],
        }
    }
}

/// Settings for the render-side event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// `native`, or `max: <hz>`
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    pub rate: UpdateRate,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { rate: UpdateRate::Max(60) }
    }
}
