//! Skeleton frame types delivered by the frame source

use serde::{Deserialize, Serialize};

use super::{JOINT_COUNT, Joint, JointId};
use crate::{RelayError, Result};

/// Sensor tracking state of one skeleton slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    #[default]
    NotTracked,
    /// Only the overall position is known, joints are not resolved.
    PositionOnly,
    Tracked,
}

/// One detected (or empty) skeleton slot in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonCandidate {
    pub tracking_state: TrackingState,

    /// Sensor-assigned id, stable while the same person stays in view
    #[serde(default)]
    pub tracking_id: u32,

    /// Joint positions indexed by [`JointId`]
    pub joints: Vec<Joint>,
}

impl SkeletonCandidate {
    pub fn new(tracking_state: TrackingState, joints: Vec<Joint>) -> Self {
        Self { tracking_state, tracking_id: 0, joints }
    }

    pub fn is_tracked(&self) -> bool {
        self.tracking_state == TrackingState::Tracked
    }

    /// Position of a joint, `None` if the id is outside the joint array.
    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.index())
    }

    /// Check the candidate has a full joint array of finite coordinates.
    pub fn validate(&self, frame_number: u32) -> Result<()> {
        if self.joints.len() != JOINT_COUNT {
            return Err(RelayError::malformed_frame(
                frame_number,
                format!("expected {} joints, found {}", JOINT_COUNT, self.joints.len()),
            ));
        }

        if let Some(index) = self.joints.iter().position(|joint| !joint.is_finite()) {
            return Err(RelayError::malformed_frame(
                frame_number,
                format!("joint {} has non-finite coordinates", JointId(index as u8)),
            ));
        }

        Ok(())
    }
}

/// One sample from the sensor.
///
/// Frames are produced by the frame source and consumed once by the
/// detection tracker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkeletonFrame {
    /// Sensor frame counter
    #[serde(default)]
    pub frame_number: u32,

    /// Sensor timestamp in milliseconds
    #[serde(default)]
    pub timestamp_ms: i64,

    #[serde(default)]
    pub candidates: Vec<SkeletonCandidate>,
}

impl SkeletonFrame {
    pub fn new(frame_number: u32, candidates: Vec<SkeletonCandidate>) -> Self {
        Self { frame_number, timestamp_ms: 0, candidates }
    }

    /// Iterate the candidates in tracked state.
    pub fn tracked(&self) -> impl Iterator<Item = &SkeletonCandidate> {
        self.candidates.iter().filter(|candidate| candidate.is_tracked())
    }
}
