//! Joint selection and projection into frame coordinates

use std::collections::BTreeSet;
use tracing::trace;

use crate::config::ExtractorConfig;
use crate::types::{Joint, JointCoord, JointId, JointPayload, SkeletonCandidate};

/// Builds [`JointPayload`]s from tracked skeletons.
#[derive(Debug, Clone)]
pub struct PayloadExtractor {
    frame_width: u32,
    frame_height: u32,
    joints: BTreeSet<JointId>,
}

impl PayloadExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self::with_joints(config.frame_width, config.frame_height, config.joints.iter().copied())
    }

    pub fn with_joints(
        frame_width: u32,
        frame_height: u32,
        joints: impl IntoIterator<Item = JointId>,
    ) -> Self {
        Self { frame_width, frame_height, joints: joints.into_iter().collect() }
    }

    pub fn joints(&self) -> impl Iterator<Item = JointId> + '_ {
        self.joints.iter().copied()
    }

    /// Project the requested joints of `candidate`.
    ///
    /// Joints the sensor could not resolve (any zero component) and ids past the
    /// end of the joint array are left out of the payload. The result may be
    /// empty.
    pub fn extract(&self, candidate: &SkeletonCandidate) -> JointPayload {
        self.joints
            .iter()
            .filter_map(|&id| {
                let joint = candidate.joint(id)?;
                if !joint.is_resolved() {
                    trace!(joint = %id, "Joint unresolved, omitted from payload");
                    return None;
                }
                Some((id, self.project(joint)))
            })
            .collect()
    }

    /// `x = floor(x * w) + w/2`, `y = floor(-y * h) + h/2`.
    ///
    /// Products are floored, not truncated toward zero, so a negative product
    /// with a fractional part lands one pixel further left (or up) than a
    /// plain integer cast would put it. Both screen axes are affected.
    pub fn project(&self, joint: &Joint) -> JointCoord {
        let width = self.frame_width as f32;
        let height = self.frame_height as f32;
        let x = (joint.x * width).floor() as i32 + (self.frame_width / 2) as i32;
        let y = (-joint.y * height).floor() as i32 + (self.frame_height / 2) as i32;
        JointCoord::new(x, y)
    }
}

impl Default for PayloadExtractor {
    fn default() -> Self {
        Self::new(&ExtractorConfig::default())
    }
}
