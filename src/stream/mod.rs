//! Stream combinators for the render side

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
