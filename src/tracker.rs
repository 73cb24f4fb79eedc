//! Debounced skeleton presence tracking
//!
//! The sensor drops skeletons for single frames all the time. The tracker
//! turns that intermittent stream into a stable present/absent state: presence
//! is reported immediately, absence only after the configured threshold has
//! passed without a tracked candidate.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::TrackerConfig;
use crate::types::{DetectionEvent, DetectionState, SkeletonCandidate, SkeletonFrame};

/// Shared handle to the detection state.
///
/// Clones share the same state, so the frame path and a render loop can each
/// hold one. [`process_frame`](Self::process_frame) is the only mutation.
#[derive(Debug, Clone)]
pub struct DetectionTracker {
    state: Arc<Mutex<DetectionState>>,
    absence_threshold: Duration,
}

impl DetectionTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self::with_threshold(config.absence_threshold(), Instant::now())
    }

    /// Create a tracker whose absence clock starts at `now`.
    pub fn with_threshold(absence_threshold: Duration, now: Instant) -> Self {
        Self { state: Arc::new(Mutex::new(DetectionState::new(now))), absence_threshold }
    }

    pub fn absence_threshold(&self) -> Duration {
        self.absence_threshold
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> DetectionState {
        *self.state.lock()
    }

    pub fn is_present(&self) -> bool {
        self.state.lock().is_present
    }

    /// Apply one frame observed at `now`.
    ///
    /// Returns [`DetectionEvent::Present`] for every frame with a tracked
    /// candidate, [`DetectionEvent::Absent`] once when the absence threshold is
    /// exceeded, and `None` otherwise. Malformed frames are logged and skipped
    /// without touching the state.
    pub fn process_frame(&self, frame: &SkeletonFrame, now: Instant) -> Option<DetectionEvent> {
        let tracked = match Self::tracked_candidates(frame) {
            Ok(tracked) => tracked,
            Err(e) => {
                warn!(frame = frame.frame_number, "Skipping skeleton frame: {}", e);
                return None;
            }
        };

        debug!(frame = frame.frame_number, tracked = tracked.len(), "Processed skeleton frame");

        let mut state = self.state.lock();

        if !tracked.is_empty() {
            let transition = !state.is_present;
            state.is_present = true;
            state.last_seen_at = now;
            drop(state);

            if transition {
                info!(skeletons = tracked.len(), "Skeleton detected");
            }
            return Some(DetectionEvent::Present { candidates: tracked, transition });
        }

        let absent_for = now.saturating_duration_since(state.last_seen_at);
        if state.is_present && absent_for > self.absence_threshold {
            state.is_present = false;
            drop(state);

            info!(absent_ms = absent_for.as_millis() as u64, "Skeleton lost");
            return Some(DetectionEvent::Absent);
        }

        None
    }

    fn tracked_candidates(frame: &SkeletonFrame) -> Result<Vec<SkeletonCandidate>> {
        frame
            .tracked()
            .map(|candidate| candidate.validate(frame.frame_number).map(|()| candidate.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{empty_frame, tracked_frame};
    use crate::types::{Joint, TrackingState};

    const THRESHOLD: Duration = Duration::from_secs(2);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn presence_is_reported_immediately() {
        let start = Instant::now();
        let tracker = DetectionTracker::with_threshold(THRESHOLD, start);

        let event = tracker.process_frame(&tracked_frame(1), start + ms(33)).unwrap();
        assert!(matches!(event, DetectionEvent::Present { transition: true, .. }));
        assert_eq!(event.candidates().len(), 1);

        let state = tracker.snapshot();
        assert!(state.is_present);
        assert_eq!(state.last_seen_at, start + ms(33));

        let event = tracker.process_frame(&tracked_frame(2), start + ms(66)).unwrap();
        assert!(matches!(event, DetectionEvent::Present { transition: false, .. }));
    }

    #[test]
    fn absence_requires_strictly_more_than_threshold() {
        let start = Instant::now();
        let tracker = DetectionTracker::with_threshold(THRESHOLD, start);
        tracker.process_frame(&tracked_frame(1), start);

        assert_eq!(tracker.process_frame(&empty_frame(2), start + THRESHOLD), None);
        assert!(tracker.is_present());

        let event = tracker.process_frame(&empty_frame(3), start + THRESHOLD + ms(1));
        assert_eq!(event, Some(DetectionEvent::Absent));
        assert!(!tracker.is_present());
    }

    #[test]
    fn absent_is_emitted_once_per_transition() {
        let start = Instant::now();
        let tracker = DetectionTracker::with_threshold(THRESHOLD, start);
        tracker.process_frame(&tracked_frame(1), start);

        let events: Vec<_> = (0..200u32)
            .filter_map(|i| tracker.process_frame(&empty_frame(i), start + ms(33 * i as u64)))
            .collect();

        assert_eq!(events, vec![DetectionEvent::Absent]);
    }

    #[test]
    fn empty_frames_before_any_detection_emit_nothing() {
        let start = Instant::now();
        let tracker = DetectionTracker::with_threshold(THRESHOLD, start);

        assert_eq!(tracker.process_frame(&empty_frame(1), start + ms(5000)), None);
        assert!(!tracker.is_present());
    }

    #[test]
    fn untracked_candidates_count_as_absence() {
        let start = Instant::now();
        let tracker = DetectionTracker::with_threshold(THRESHOLD, start);
        tracker.process_frame(&tracked_frame(1), start);

        let mut frame = tracked_frame(2);
        frame.candidates[0].tracking_state = TrackingState::PositionOnly;

        assert_eq!(tracker.process_frame(&frame, start + ms(2500)), Some(DetectionEvent::Absent));
    }

    #[test]
    fn malformed_frames_leave_state_untouched() {
        let start = Instant::now();
        let tracker = DetectionTracker::with_threshold(THRESHOLD, start);
        tracker.process_frame(&tracked_frame(1), start);
        let before = tracker.snapshot();

        let mut short = tracked_frame(2);
        short.candidates[0].joints.truncate(4);
        assert_eq!(tracker.process_frame(&short, start + ms(100)), None);

        let mut nan = tracked_frame(3);
        nan.candidates[0].joints[2] = Joint::new(f32::NAN, 1.0, 1.0);
        assert_eq!(tracker.process_frame(&nan, start + ms(3000)), None);

        assert_eq!(tracker.snapshot(), before);
    }

    #[test]
    fn clones_share_state_across_threads() {
        let start = Instant::now();
        let tracker = DetectionTracker::with_threshold(THRESHOLD, start);
        let render_side = tracker.clone();

        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                tracker.process_frame(&tracked_frame(i), start + ms(i as u64));
            }
        });
        handle.join().unwrap();

        let state = render_side.snapshot();
        assert!(state.is_present);
        assert_eq!(state.last_seen_at, start + ms(99));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn flips_to_absent_exactly_once_after_threshold(
                tracked_frames in 1usize..20,
                gap_ms in 1u64..100,
                empty_frames in 1usize..200,
            ) {
                let start = Instant::now();
                let tracker = DetectionTracker::with_threshold(THRESHOLD, start);
                let mut now = start;

                for i in 0..tracked_frames {
                    now += ms(gap_ms);
                    tracker.process_frame(&tracked_frame(i as u32), now);
                }
                let last_seen = now;

                let mut absent_at = Vec::new();
                for i in 0..empty_frames {
                    now += ms(gap_ms);
                    if let Some(event) = tracker.process_frame(&empty_frame(i as u32), now) {
                        prop_assert_eq!(&event, &DetectionEvent::Absent);
                        absent_at.push(now);
                    }
                }

                let elapsed = now - last_seen;
                if elapsed > THRESHOLD {
                    prop_assert_eq!(absent_at.len(), 1);
                    prop_assert!(absent_at[0] - last_seen > THRESHOLD);
                    prop_assert!(absent_at[0] - last_seen <= THRESHOLD + ms(gap_ms));
                } else {
                    prop_assert!(absent_at.is_empty());
                    prop_assert!(tracker.is_present());
                }
            }

            #[test]
            fn reappearance_within_threshold_never_flips(
                gaps in prop::collection::vec(1u64..=2000, 1..50),
            ) {
                let start = Instant::now();
                let tracker = DetectionTracker::with_threshold(THRESHOLD, start);
                let mut now = start;
                tracker.process_frame(&tracked_frame(0), now);

                for (i, gap) in gaps.iter().enumerate() {
                    // Empty frame right at the edge of the window, then the skeleton returns.
                    let event = tracker.process_frame(&empty_frame(i as u32), now + ms(*gap));
                    prop_assert_eq!(event, None);
                    now += ms(*gap);
                    let event = tracker.process_frame(&tracked_frame(i as u32), now);
                    let steady = matches!(event, Some(DetectionEvent::Present { transition: false, .. }));
                    prop_assert!(steady, "expected a steady Present event, got {:?}", event);
                }
                prop_assert!(tracker.is_present());
            }
        }
    }
}
