//! Rate control for outbound telemetry and render streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum delivery rate for a consumer of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRate {
    /// Every item, at the rate the source produces them
    #[default]
    Native,

    /// At most this many items per second (0 is treated as Native)
    Max(u32),
}

impl UpdateRate {
    /// Minimum spacing between two deliveries; zero for unthrottled rates.
    pub fn min_interval(self) -> Duration {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => Duration::ZERO,
            UpdateRate::Max(hz) => Duration::from_secs_f64(1.0 / hz as f64),
        }
    }

    /// Check if throttling is needed against a source running at `source_hz`.
    pub fn needs_throttle(self, source_hz: f64) -> bool {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => false,
            UpdateRate::Max(hz) => (hz as f64) < source_hz,
        }
    }
}
