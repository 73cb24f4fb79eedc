//! Driver owns the frame source and runs every frame through the pipeline

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::RelayConfig;
use crate::extractor::PayloadExtractor;
use crate::publisher::{Connector, Publisher, PublisherStats, WebSocketConnector};
use crate::source::FrameSource;
use crate::stream::ThrottleExt;
use crate::tracker::DetectionTracker;
use crate::types::{DetectionEvent, DetectionState, UpdateRate};
use crate::{RelayError, Result};

/// Consecutive source errors tolerated before the driver gives up.
const MAX_ERRORS: u32 = 10;

/// Everything a frame passes through after the source.
pub struct Pipeline<C: Connector = WebSocketConnector> {
    pub tracker: DetectionTracker,
    pub extractor: PayloadExtractor,
    pub publisher: Publisher<C>,
}

impl Pipeline<WebSocketConnector> {
    /// Pipeline publishing over WebSocket. The publisher connects lazily.
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            tracker: DetectionTracker::new(&config.tracker),
            extractor: PayloadExtractor::new(&config.extractor),
            publisher: Publisher::from_config(&config.publisher),
        }
    }
}

/// Totals reported when the driver task ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub frames: u64,
    pub source_errors: u64,
    pub publisher: PublisherStats,
}

/// Driver spawns and manages the frame processing task
pub struct Driver;

impl Driver {
    /// Spawn the frame task for `source`.
    pub fn spawn<S, C>(source: S, pipeline: Pipeline<C>) -> DriverHandle
    where
        S: FrameSource,
        C: Connector,
    {
        let (event_tx, event_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let tracker = pipeline.tracker.clone();
        let source_hz = source.tick_rate();

        let task = tokio::spawn(Self::frame_task(source, pipeline, event_tx, cancel.clone()));

        DriverHandle { events: event_rx, tracker, cancel, source_hz, task: Some(task) }
    }

    async fn frame_task<S, C>(
        mut source: S,
        mut pipeline: Pipeline<C>,
        event_tx: watch::Sender<Option<Arc<DetectionEvent>>>,
        cancel: CancellationToken,
    ) -> DriverReport
    where
        S: FrameSource,
        C: Connector,
    {
        info!("Frame task started ({}Hz source)", source.tick_rate());
        let mut report = DriverReport::default();
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Frame task cancelled");
                    break;
                }
                result = source.next_frame() => result,
            };

            match result {
                Ok(Some(frame)) => {
                    report.frames += 1;
                    error_count = 0;
                    trace!("Frame {} ({} candidates)", frame.frame_number, frame.candidates.len());

                    let Some(event) = pipeline.tracker.process_frame(&frame, Instant::now()) else {
                        continue;
                    };

                    if let Some(candidate) = event.candidates().first() {
                        let payload = pipeline.extractor.extract(candidate);
                        if let Err(e) = pipeline.publisher.publish(&payload).await {
                            warn!(frame = frame.frame_number, "Publish aborted: {}", e);
                        }
                    }

                    // Nobody watching is fine: the render side is optional.
                    event_tx.send_replace(Some(Arc::new(event)));
                }
                Ok(None) => {
                    info!("Frame source ended after {} frames", report.frames);
                    break;
                }
                Err(e) => {
                    // Sensor errors skip the frame; the tracker state is untouched
                    error_count += 1;
                    report.source_errors += 1;
                    error!("Frame source error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if error_count >= MAX_ERRORS {
                        error!("Too many frame source errors, shutting down");
                        break;
                    }

                    // Exponential backoff: 50ms, 100ms, 200ms, ...
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        source.close().await;
        pipeline.publisher.close().await;
        report.publisher = pipeline.publisher.stats();

        info!(
            frames = report.frames,
            sent = report.publisher.sent,
            dropped = report.publisher.dropped,
            "Frame task ended"
        );
        report
    }
}

/// Handle to a running driver.
///
/// Dropping the handle cancels the frame task.
pub struct DriverHandle {
    events: watch::Receiver<Option<Arc<DetectionEvent>>>,
    tracker: DetectionTracker,
    cancel: CancellationToken,
    source_hz: f64,
    task: Option<JoinHandle<DriverReport>>,
}

impl DriverHandle {
    /// Most recent detection event, if any frame produced one yet.
    pub fn latest_event(&self) -> Option<Arc<DetectionEvent>> {
        self.events.borrow().clone()
    }

    /// Current debounced detection state.
    pub fn detection(&self) -> DetectionState {
        self.tracker.snapshot()
    }

    pub fn tracker(&self) -> &DetectionTracker {
        &self.tracker
    }

    /// Native rate of the frame source
    pub fn source_hz(&self) -> f64 {
        self.source_hz
    }

    /// Detection events for a render loop, at most `rate` per second.
    ///
    /// Throttling is latest-wins, so a slow consumer always sees the newest
    /// event. The stream ends when the driver stops.
    pub fn events(&self, rate: UpdateRate) -> impl Stream<Item = Arc<DetectionEvent>> + 'static {
        let events = WatchStream::from_changes(self.events.clone()).filter_map(|event| async move { event });

        if rate.needs_throttle(self.source_hz) {
            events.throttle(rate.min_interval()).boxed()
        } else {
            events.boxed()
        }
    }

    /// Wait for the frame task to end by itself (source exhausted).
    pub async fn join(mut self) -> Result<DriverReport> {
        self.wait().await
    }

    /// Stop the frame task and wait for the source and publisher to close.
    ///
    /// Returns the default report when the task was already collected.
    pub async fn shutdown(&mut self) -> Result<DriverReport> {
        self.cancel.cancel();
        self.wait().await
    }

    async fn wait(&mut self) -> Result<DriverReport> {
        let Some(task) = self.task.take() else {
            return Ok(DriverReport::default());
        };
        task.await.map_err(|e| RelayError::source_failed(format!("frame task failed: {e}")))
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        debug!("Dropping driver handle");
        self.cancel.cancel();
    }
}
