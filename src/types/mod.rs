//! Core types for decoded RTT telemetry.
//!
//! - [`LogRecord`] is one decoded message with its recovered source context
//! - [`DeviceTime`] is an exact device-side timestamp recovered from a unit-annotated literal
//! - [`LogLevel`] is the firmware severity, ordinal `0..=5`
//! - [`ProbeStatus`] and [`ConnectionState`] describe the probe session
//! - [`UpdateRate`] throttles status streams
//!
//! ## Usage Example
//!
//! ```rust
//! use rttlog::types::{DeviceTime, LogLevel, LogRecord};
//!
//! let record = LogRecord::parse(0, r#"("src/main.cpp", 42, 2, 1500ms, """main""")booted"#);
//! assert_eq!(record.file_name, "main.cpp");
//! assert_eq!(record.level, LogLevel::Info);
//! assert_eq!(record.device_time, DeviceTime::from_ratio(3, 1, 2).unwrap());
//! assert_eq!(record.message, "booted");
//! ```

mod device_time;
mod level;
mod record;
mod status;
mod update_rate;

pub use device_time::DeviceTime;
pub use level::LogLevel;
pub use record::{LogRecord, TimedRecord};
pub use status::{ConnectionState, ProbeStatus};
pub use update_rate::UpdateRate;
