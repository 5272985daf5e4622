//! Record parser
//!
//! Firmware prefixes each message with a context block:
//!
//! ```text
//! ("src/drivers/uart.cpp", 118, 3, 1[1/32768]s, """void Uart::isr()""")overrun
//! ```
//!
//! holding the source file, line, level ordinal, device-time literal and function name.
//! The block is all or nothing: if any field fails validation the whole text becomes the
//! message of a context-less record.

use crate::types::{DeviceTime, LogLevel, LogRecord};

const BLOCK_END: &str = "\"\"\")";
const FUNCTION_QUOTE: &str = "\"\"\"";

/// Parse one decoded message received on `channel`.
pub fn parse_record(channel: usize, text: &str) -> LogRecord {
    parse_context(channel, text).unwrap_or_else(|| LogRecord::plain(channel, text))
}

fn parse_context(channel: usize, text: &str) -> Option<LogRecord> {
    let body = text.strip_prefix('(')?;
    let (block, message) = body.split_once(BLOCK_END)?;
    if block.matches(',').count() < 4 {
        return None;
    }

    let (file, rest) = next_field(block)?;
    let (line, rest) = next_field(rest)?;
    let (level, rest) = next_field(rest)?;
    let (time, rest) = next_field(rest)?;

    let file_name = parse_file_name(file)?;
    let line = parse_digits(line)?;
    let level = LogLevel::from_ordinal(parse_digits(level)?)?;
    let device_time = DeviceTime::parse_literal(time)?;
    let function_name = rest.strip_prefix(FUNCTION_QUOTE)?;

    Some(LogRecord {
        channel,
        device_time,
        file_name: file_name.to_string(),
        line,
        level,
        function_name: function_name.to_string(),
        message: message.to_string(),
    })
}

/// Split off text up to the next `", "` separator.
fn next_field(s: &str) -> Option<(&str, &str)> {
    s.split_once(", ")
}

fn parse_file_name(field: &str) -> Option<&str> {
    if field.len() < 2 {
        return None;
    }
    let path = field.strip_prefix('"')?.strip_suffix('"')?;
    Some(basename(path))
}

fn parse_digits<T: std::str::FromStr>(field: &str) -> Option<T> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Final path component, accepting both separators since firmware may be built on Windows.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
