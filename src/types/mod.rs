//! Core types for skeleton tracking data.
//!
//! ## Architecture
//!
//! - [`SkeletonFrame`] is one sensor sample holding zero or more [`SkeletonCandidate`]s
//! - [`Joint`] / [`JointId`] describe sensor-space joint positions and their stable ids
//! - [`DetectionState`] / [`DetectionEvent`] are the debounced output of the tracker
//! - [`JointPayload`] is the wire record published to the relay
//! - [`UpdateRate`] controls how often consumers receive items
//!
//! ## Usage Example
//!
//! ```rust
//! use skeleton_relay::types::{Joint, JointId, SkeletonCandidate, SkeletonFrame, TrackingState, JOINT_COUNT};
//!
//! let mut joints = vec![Joint::default(); JOINT_COUNT];
//! joints[JointId::HEAD.index()] = Joint::new(0.05, 0.4, 2.1);
//!
//! let frame = SkeletonFrame::new(1, vec![SkeletonCandidate::new(TrackingState::Tracked, joints)]);
//! assert_eq!(frame.tracked().count(), 1);
//! ```

mod detection;
mod frame;
mod joint;
mod payload;
mod update_rate;

pub use detection::{DetectionEvent, DetectionState};
pub use frame::{SkeletonCandidate, SkeletonFrame, TrackingState};
pub use joint::{JOINT_COUNT, Joint, JointId};
pub use payload::{JointCoord, JointPayload};
pub use update_rate::UpdateRate;
