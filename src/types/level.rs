//! Firmware log levels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RttError;

/// Severity attached to a record by the firmware logging macro.
///
/// The wire carries the ordinal (`0..=5`); anything outside that range is rejected
/// by [`LogLevel::from_ordinal`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Crit = 5,
}

impl LogLevel {
    /// All levels in ordinal order.
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Crit,
    ];

    /// Convert a wire ordinal into a level.
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }

    /// Like [`LogLevel::from_ordinal`], but maps out-of-range values to `Trace`.
    ///
    /// Only meant for display paths that must never fail.
    pub fn from_ordinal_lossy(ordinal: usize) -> Self {
        Self::ALL.get(ordinal).copied().unwrap_or(LogLevel::Trace)
    }

    /// Wire ordinal of this level.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Lowercase name used in record files.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Crit => "crit",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = RttError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RttError::parse("log level", format!("unknown level '{s}'")))
    }
}
