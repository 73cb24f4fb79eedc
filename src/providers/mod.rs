//! Frame source implementations

pub mod feed;
pub mod replay;

pub use feed::{FrameFeed, FrameSender, SENSOR_HZ};
pub use replay::ReplaySource;
