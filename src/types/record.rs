//! Decoded log records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{DeviceTime, LogLevel};

/// One decoded unit of telemetry.
///
/// Built once by the record parser and shared read-only afterwards. Records whose
/// message carried no context block have an empty file and function name, line 0,
/// level [`LogLevel::Trace`] and a zero device time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub channel: usize,
    pub device_time: DeviceTime,
    /// Basename of the emitting source file.
    pub file_name: String,
    pub line: u32,
    pub level: LogLevel,
    pub function_name: String,
    /// Human-readable text; may contain `@METRIC(...)` markers.
    pub message: String,
}

impl LogRecord {
    /// Parse decoded text received on `channel`.
    pub fn parse(channel: usize, text: &str) -> Self {
        crate::parser::parse_record(channel, text)
    }

    /// A record without context.
    pub fn plain(channel: usize, message: impl Into<String>) -> Self {
        Self { channel, message: message.into(), ..Self::default() }
    }

    /// Whether any context field differs from the context-less defaults.
    pub fn has_context(&self) -> bool {
        !self.file_name.is_empty()
            || !self.function_name.is_empty()
            || self.line != 0
            || self.level != LogLevel::Trace
            || !self.device_time.is_zero()
    }

    /// `file:line`, the key used by location filters and unscoped metrics.
    pub fn location(&self) -> String {
        format!("{}:{}", self.file_name, self.line)
    }

    /// Serialize back into the firmware's `("file", line, level, time, """function""")message`
    /// convention. Context-less records serialize to their bare message.
    pub fn to_wire_text(&self) -> String {
        if !self.has_context() {
            return self.message.clone();
        }
        format!(
            "(\"{}\", {}, {}, {}, \"\"\"{}\"\"\"){}",
            self.file_name,
            self.line,
            self.level.ordinal(),
            self.device_time.to_literal(),
            self.function_name,
            self.message
        )
    }
}

/// A record paired with the wall-clock time it was received on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRecord {
    pub received_at: DateTime<Utc>,
    pub record: Arc<LogRecord>,
}

impl TimedRecord {
    pub fn new(received_at: DateTime<Utc>, record: Arc<LogRecord>) -> Self {
        Self { received_at, record }
    }
}
