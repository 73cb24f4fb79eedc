//! Real-time skeleton detection pipeline with a WebSocket relay.
//!
//! Frames from a skeletal-tracking sensor run through a debounced presence
//! tracker; the tracked skeleton is reduced to a few projected joints and
//! published as JSON to a relay server, which fans every message out to its
//! connected clients.
//!
//! # Features
//!
//! - **Debounced detection**: presence flips on immediately, off only after
//!   a configurable absence window
//! - **Best-effort publishing**: rate limited, lazily reconnecting, never
//!   blocks the frame loop for longer than the connect timeout
//! - **Relay server**: per-client tasks and queues, echo plus fan-out
//! - **Replay**: JSON-lines recordings stand in for the sensor
//!
//! ## Example (replay a recording)
//!
//! ```rust,no_run
//! use skeleton_relay::{RelayConfig, SkeletonRelay, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> skeleton_relay::Result<()> {
//!     let config = RelayConfig::default();
//!     let driver = SkeletonRelay::replay("session.jsonl", &config)?;
//!     let mut events = driver.events(UpdateRate::Max(60));
//!
//!     while let Some(event) = events.next().await {
//!         println!("present: {}", event.is_present());
//!     }
//!     Ok(())
//! }
//! ```

mod error;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod types;

pub mod config;
pub mod driver;
pub mod extractor;
pub mod providers;
pub mod publisher;
pub mod server;
pub mod source;
pub mod stream;
pub mod tracker;

// Core exports
pub use error::*;
pub use types::*;

pub use config::RelayConfig;
pub use driver::{Driver, DriverHandle, DriverReport, Pipeline};
pub use extractor::PayloadExtractor;
pub use providers::{FrameFeed, FrameSender, ReplaySource};
pub use publisher::{ConnectionState, PublishOutcome, Publisher, PublisherStats};
pub use server::{ClientSet, RelayServerBuilder, RelayServerHandle};
pub use source::FrameSource;
pub use tracker::DetectionTracker;

use std::path::Path;
use tracing::info;

/// Entry point wiring configuration to the pipeline and the relay.
pub struct SkeletonRelay;

impl SkeletonRelay {
    /// Start a relay server from `config.server`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Bind`] if the listen address is unavailable.
    pub async fn serve(config: &RelayConfig) -> Result<RelayServerHandle> {
        RelayServerBuilder::new(config.server.clone()).spawn().await
    }

    /// Drive a sensor feed through the pipeline.
    ///
    /// The returned [`FrameSender`] goes to the sensor callback; frames beyond
    /// `capacity` unread are discarded.
    pub fn live(config: &RelayConfig, capacity: usize) -> (FrameSender, DriverHandle) {
        let (sender, feed) = FrameFeed::channel(capacity);
        let driver = Driver::spawn(feed, Pipeline::from_config(config));
        (sender, driver)
    }

    /// Replay a JSON-lines recording through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::File`] if the recording cannot be read.
    pub fn replay<P: AsRef<Path>>(path: P, config: &RelayConfig) -> Result<DriverHandle> {
        let source = ReplaySource::open(path)?;
        info!(frames = source.total_frames(), "Replaying recording");
        Ok(Driver::spawn(source, Pipeline::from_config(config)))
    }
}
