//! Push adapter for callback-driven sensor SDKs
//!
//! Sensor SDKs deliver frames by invoking a callback on a thread they own. The
//! callback only needs a [`FrameSender`]: [`FrameSender::deliver`] never
//! blocks, so the SDK thread is never held up by the pipeline. The matching
//! [`FrameFeed`] is the [`FrameSource`] the driver reads from.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

use crate::Result;
use crate::source::FrameSource;
use crate::types::SkeletonFrame;

/// Sensor frame rate.
pub const SENSOR_HZ: f64 = 30.0;

/// Callback side of a frame feed. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<SkeletonFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    /// Hand a frame to the pipeline.
    ///
    /// Returns `false` when the frame was discarded, either because the
    /// pipeline is behind (queue full) or because the feed was closed.
    pub fn deliver(&self, frame: SkeletonFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(frame = frame.frame_number, dropped, "Pipeline behind, frame discarded");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Frames discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Pipeline side of a frame feed.
#[derive(Debug)]
pub struct FrameFeed {
    rx: mpsc::Receiver<SkeletonFrame>,
}

impl FrameFeed {
    /// Create a feed buffering up to `capacity` frames.
    pub fn channel(capacity: usize) -> (FrameSender, FrameFeed) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sender = FrameSender { tx, dropped: Arc::new(AtomicU64::new(0)) };
        (sender, FrameFeed { rx })
    }
}

#[async_trait::async_trait]
impl FrameSource for FrameFeed {
    async fn next_frame(&mut self) -> Result<Option<SkeletonFrame>> {
        Ok(self.rx.recv().await)
    }

    fn tick_rate(&self) -> f64 {
        SENSOR_HZ
    }

    async fn close(&mut self) {
        if !self.rx.is_closed() {
            debug!("Closing frame feed");
            self.rx.close();
        }
    }
}
