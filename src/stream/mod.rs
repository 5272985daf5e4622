//! Stream combinators for status and state streams

pub mod throttle;

pub use throttle::{Throttle, ThrottleExt};
