//! Update rate control for status streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update rate for status and state streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every snapshot the connection manager publishes (once per poll round).
    #[default]
    Native,

    /// Throttled to at most this many snapshots per second.
    /// Rates at or above the source rate fall back to `Native`; zero is treated as 1 Hz.
    Max(u32),
}

impl UpdateRate {
    /// Effective rate against a source publishing at `source_hz`.
    pub fn normalize(self, source_hz: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(hz) if f64::from(hz) >= source_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz.max(1)),
        }
    }

    pub fn needs_throttle(self, source_hz: f64) -> bool {
        matches!(self.normalize(source_hz), UpdateRate::Max(_))
    }

    /// Minimum spacing between emitted items, if throttling applies.
    pub fn throttle_interval(self, source_hz: f64) -> Option<Duration> {
        match self.normalize(source_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }

    /// Publication rate of a loop that sleeps `pause` between rounds.
    pub fn source_hz_for(pause: Duration) -> f64 {
        if pause.is_zero() { f64::INFINITY } else { 1.0 / pause.as_secs_f64() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_above_source_are_native() {
        assert_eq!(UpdateRate::Max(2000).normalize(1000.0), UpdateRate::Native);
        assert!(!UpdateRate::Native.needs_throttle(1000.0));
        assert!(UpdateRate::Max(10).needs_throttle(1000.0));
    }

    #[test]
    fn zero_rate_is_clamped() {
        assert_eq!(UpdateRate::Max(0).throttle_interval(1000.0), Some(Duration::from_secs(1)));
    }

    #[test]
    fn interval_matches_rate() {
        let hz = UpdateRate::source_hz_for(Duration::from_millis(1));
        assert_eq!(UpdateRate::Max(20).throttle_interval(hz), Some(Duration::from_millis(50)));
        assert_eq!(UpdateRate::source_hz_for(Duration::ZERO), f64::INFINITY);
    }
}
