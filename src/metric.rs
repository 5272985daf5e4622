//! Metric markers embedded in record messages
//!
//! Firmware reports measurements inline as `@METRIC(scope::name[unit]=value)`. The scope
//! may be empty, in which case the emitting `file:line` stands in for it, and the unit
//! bracket is optional.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{DeviceTime, LogLevel, LogRecord};

const MARKER: &str = "@METRIC(";

/// Identity of a metric series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricInfo {
    pub scope: String,
    pub name: String,
    pub unit: String,
}

impl fmt::Display for MetricInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.scope, self.name)?;
        if !self.unit.is_empty() {
            write!(f, "[{}]", self.unit)?;
        }
        Ok(())
    }
}

/// One measurement taken from a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub info: MetricInfo,
    pub received_at: DateTime<Utc>,
    pub level: LogLevel,
    pub device_time: DeviceTime,
    pub value: f64,
}

/// Every well-formed marker in `record.message`, in order of appearance.
///
/// Markers without `::` or `=`, or whose value is not a number, are skipped. An
/// unterminated marker ends the scan.
pub fn extract_metrics(received_at: DateTime<Utc>, record: &LogRecord) -> Vec<MetricSample> {
    let mut samples = Vec::new();
    let mut rest = record.message.as_str();

    while let Some(start) = rest.find(MARKER) {
        let after = &rest[start + MARKER.len()..];
        let Some(end) = after.find(')') else {
            break;
        };
        if let Some((info, value)) = parse_marker(&after[..end], record) {
            samples.push(MetricSample {
                info,
                received_at,
                level: record.level,
                device_time: record.device_time,
                value,
            });
        }
        rest = &after[end + 1..];
    }

    samples
}

fn parse_marker(content: &str, record: &LogRecord) -> Option<(MetricInfo, f64)> {
    let (scope, remainder) = content.split_once("::")?;
    let (name_and_unit, value) = remainder.split_once('=')?;
    let value: f64 = value.trim().parse().ok()?;

    let (name, unit) = match name_and_unit.split_once('[') {
        Some((name, unit)) => match unit.split_once(']') {
            Some((unit, _)) => (name, unit),
            None => (name_and_unit, ""),
        },
        None => (name_and_unit, ""),
    };

    let scope = if scope.is_empty() { record.location() } else { scope.to_string() };
    Some((MetricInfo { scope, name: name.to_string(), unit: unit.to_string() }, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message: &str) -> LogRecord {
        LogRecord {
            file_name: "adc.cpp".into(),
            line: 77,
            level: LogLevel::Info,
            device_time: DeviceTime::from_secs(3),
            ..LogRecord::plain(0, message)
        }
    }

    #[test]
    fn extracts_scoped_and_unscoped_markers() {
        let now = Utc::now();
        let samples = extract_metrics(
            now,
            &record("vin @METRIC(power::vin[V]=12.25) temp @METRIC(::temp[degC]=-4) count @METRIC(io::rx=17)"),
        );
        assert_eq!(samples.len(), 3);

        assert_eq!(samples[0].info, MetricInfo { scope: "power".into(), name: "vin".into(), unit: "V".into() });
        assert_eq!(samples[0].value, 12.25);
        assert_eq!(samples[0].level, LogLevel::Info);
        assert_eq!(samples[0].device_time, DeviceTime::from_secs(3));
        assert_eq!(samples[0].received_at, now);

        assert_eq!(samples[1].info.scope, "adc.cpp:77");
        assert_eq!(samples[1].value, -4.0);

        assert_eq!(samples[2].info.unit, "");
        assert_eq!(samples[2].info.to_string(), "io::rx");
    }

    #[test]
    fn malformed_markers_are_skipped() {
        let samples = extract_metrics(
            Utc::now(),
            &record("@METRIC(novalue) @METRIC(a::b[x]) @METRIC(a::b=abc) @METRIC(a::ok=1)"),
        );
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].info.name, "ok");
    }

    #[test]
    fn samples_serialize_with_their_timestamp() {
        let received_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let sample = extract_metrics(received_at, &record("@METRIC(power::vin[V]=12.25)")).remove(0);
        let yaml = serde_yaml_ng::to_string(&sample).unwrap();
        assert!(yaml.contains("2023-11-14T22:13:20Z"), "{yaml}");
        assert_eq!(serde_yaml_ng::from_str::<MetricSample>(&yaml).unwrap(), sample);
    }

    #[test]
    fn unclosed_unit_keeps_the_whole_name() {
        let samples = extract_metrics(Utc::now(), &record("@METRIC(s::speed[rpm=5)"));
        assert_eq!(samples[0].info.name, "speed[rpm");
        assert_eq!(samples[0].info.unit, "");
    }

    #[test]
    fn unterminated_marker_stops_the_scan() {
        let samples = extract_metrics(Utc::now(), &record("@METRIC(a::x=1 @METRIC(a::y=2)"));
        // the first marker swallows up to the only ')'
        assert!(samples.is_empty());

        let samples = extract_metrics(Utc::now(), &record("@METRIC(a::x=1) @METRIC(a::y=2"));
        assert_eq!(samples.len(), 1);
    }
}
