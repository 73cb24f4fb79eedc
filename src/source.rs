//! Frame source trait for skeleton data

use crate::Result;
use crate::types::SkeletonFrame;

/// Producer of skeleton frames.
///
/// Sources abstract over where frames come from (a sensor SDK callback, a
/// recording) and handle their own pacing.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Wait for the next frame.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame available
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - Error occurred; the caller may keep polling
    async fn next_frame(&mut self) -> Result<Option<SkeletonFrame>>;

    /// Native frame rate in Hz (30 for the sensor)
    fn tick_rate(&self) -> f64;

    /// Release the underlying device or file. Must be safe to call repeatedly.
    async fn close(&mut self) {}
}
