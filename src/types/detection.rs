//! Detection state and the events the tracker emits

use std::time::Instant;

use super::SkeletonCandidate;

/// Snapshot of the tracker's debounced presence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionState {
    pub is_present: bool,

    /// Last time a tracked candidate was observed (or tracker creation)
    pub last_seen_at: Instant,
}

impl DetectionState {
    pub fn new(now: Instant) -> Self {
        Self { is_present: false, last_seen_at: now }
    }

    /// Status line for a render overlay.
    pub fn status_text(&self) -> &'static str {
        if self.is_present { "Skeleton detected" } else { "No skeleton detected" }
    }
}

/// Event produced by [`DetectionTracker::process_frame`](crate::DetectionTracker::process_frame).
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionEvent {
    /// At least one tracked candidate this frame.
    Present {
        candidates: Vec<SkeletonCandidate>,
        /// First present frame after an absence
        transition: bool,
    },

    /// Absence threshold elapsed; emitted once per transition.
    Absent,
}

impl DetectionEvent {
    /// Tracked candidates carried by the event (empty for [`DetectionEvent::Absent`]).
    pub fn candidates(&self) -> &[SkeletonCandidate] {
        match self {
            DetectionEvent::Present { candidates, .. } => candidates,
            DetectionEvent::Absent => &[],
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, DetectionEvent::Present { .. })
    }

    /// Whether the event changes the externally visible state.
    pub fn is_transition(&self) -> bool {
        match self {
            DetectionEvent::Present { transition, .. } => *transition,
            DetectionEvent::Absent => true,
        }
    }
}
