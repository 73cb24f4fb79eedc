//! Joint identifiers and sensor-space joint positions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of joints the sensor reports for every skeleton.
pub const JOINT_COUNT: usize = 20;

/// Stable joint identifier, the index into a skeleton's joint array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JointId(pub u8);

impl JointId {
    pub const HIP_CENTER: JointId = JointId(0);
    pub const SPINE: JointId = JointId(1);
    pub const SHOULDER_CENTER: JointId = JointId(2);
    pub const HEAD: JointId = JointId(3);
    pub const SHOULDER_LEFT: JointId = JointId(4);
    pub const ELBOW_LEFT: JointId = JointId(5);
    pub const WRIST_LEFT: JointId = JointId(6);
    pub const HAND_LEFT: JointId = JointId(7);
    pub const SHOULDER_RIGHT: JointId = JointId(8);
    pub const ELBOW_RIGHT: JointId = JointId(9);
    pub const WRIST_RIGHT: JointId = JointId(10);
    pub const HAND_RIGHT: JointId = JointId(11);
    pub const HIP_LEFT: JointId = JointId(12);
    pub const KNEE_LEFT: JointId = JointId(13);
    pub const ANKLE_LEFT: JointId = JointId(14);
    pub const FOOT_LEFT: JointId = JointId(15);
    pub const HIP_RIGHT: JointId = JointId(16);
    pub const KNEE_RIGHT: JointId = JointId(17);
    pub const ANKLE_RIGHT: JointId = JointId(18);
    pub const FOOT_RIGHT: JointId = JointId(19);

    /// Index into a skeleton's joint array.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Anatomical name, or `None` for ids outside the skeleton.
    pub fn name(self) -> Option<&'static str> {
        const NAMES: [&str; JOINT_COUNT] = [
            "hip_center",
            "spine",
            "shoulder_center",
            "head",
            "shoulder_left",
            "elbow_left",
            "wrist_left",
            "hand_left",
            "shoulder_right",
            "elbow_right",
            "wrist_right",
            "hand_right",
            "hip_left",
            "knee_left",
            "ankle_left",
            "foot_left",
            "hip_right",
            "knee_right",
            "ankle_right",
            "foot_right",
        ];
        NAMES.get(self.index()).copied()
    }

    /// Wire key used in JSON payloads (`joint_<id>`).
    pub fn wire_key(self) -> String {
        format!("joint_{}", self.0)
    }

    /// Parse a `joint_<id>` wire key.
    pub fn from_wire_key(key: &str) -> Option<Self> {
        key.strip_prefix("joint_")?.parse::<u8>().ok().map(JointId)
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Joint position in sensor space (meters, camera-centred).
///
/// The sensor reports `(0, 0, 0)` for joints it cannot currently resolve.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Joint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Joint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// All three components non-zero, i.e. the sensor resolved this joint.
    pub fn is_resolved(&self) -> bool {
        self.x != 0.0 && self.y != 0.0 && self.z != 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}
