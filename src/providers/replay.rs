//! Replay source for recorded skeleton sessions
//!
//! Recordings are JSON-lines files, one [`SkeletonFrame`] per line. Lines are
//! decoded as they are played back, so a corrupt line surfaces as an error for
//! that frame only and playback continues with the next one.

use std::path::Path;
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::providers::feed::SENSOR_HZ;
use crate::source::FrameSource;
use crate::types::SkeletonFrame;
use crate::{RelayError, Result};

enum Entry {
    Line { number: usize, text: String },
    Frame(SkeletonFrame),
}

/// Replays recorded frames at the sensor rate.
pub struct ReplaySource {
    entries: Vec<Entry>,
    position: usize,

    /// Created on the first frame so sources can be built outside a runtime
    interval: Option<Interval>,
    tick_rate: f64,
}

impl ReplaySource {
    /// Open a JSON-lines recording.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::file_error(path.to_path_buf(), e))?;

        let entries: Vec<Entry> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| Entry::Line { number: index + 1, text: line.to_string() })
            .collect();

        info!("Opened recording {}: {} frames at {}Hz", path.display(), entries.len(), SENSOR_HZ);
        Ok(Self::from_entries(entries))
    }

    /// Replay frames already in memory.
    pub fn from_frames(frames: Vec<SkeletonFrame>) -> Self {
        Self::from_entries(frames.into_iter().map(Entry::Frame).collect())
    }

    fn from_entries(entries: Vec<Entry>) -> Self {
        Self { entries, position: 0, interval: None, tick_rate: SENSOR_HZ }
    }

    fn pacing(tick_rate: f64) -> Interval {
        let mut pacing = interval(Duration::from_secs_f64(1.0 / tick_rate));
        pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
        pacing
    }

    pub fn total_frames(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait::async_trait]
impl FrameSource for ReplaySource {
    async fn next_frame(&mut self) -> Result<Option<SkeletonFrame>> {
        if self.position >= self.entries.len() {
            debug!("Reached end of recording");
            return Ok(None);
        }

        let tick_rate = self.tick_rate;
        self.interval.get_or_insert_with(|| Self::pacing(tick_rate)).tick().await;

        let entry = &self.entries[self.position];
        self.position += 1;
        trace!("Frame {}/{}", self.position, self.entries.len());

        match entry {
            Entry::Frame(frame) => Ok(Some(frame.clone())),
            Entry::Line { number, text } => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| RelayError::serialization(format!("recording line {number}"), e)),
        }
    }

    fn tick_rate(&self) -> f64 {
        self.tick_rate
    }

    async fn close(&mut self) {
        self.position = self.entries.len();
    }
}
