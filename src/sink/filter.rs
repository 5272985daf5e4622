//! Record filtering

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Sink;
use crate::types::{LogLevel, LogRecord};

/// Which records reach a sink. An empty set places no restriction on its field.
///
/// Locations match either a whole file (`main.cpp`) or one line (`main.cpp:42`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
    pub levels: BTreeSet<LogLevel>,
    pub channels: BTreeSet<usize>,
    pub locations: BTreeSet<String>,
}

impl RecordFilter {
    /// A filter that passes everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only levels at or above `minimum`.
    pub fn min_level(minimum: LogLevel) -> Self {
        Self { levels: LogLevel::ALL.into_iter().filter(|l| *l >= minimum).collect(), ..Self::default() }
    }

    pub fn with_channels(mut self, channels: impl IntoIterator<Item = usize>) -> Self {
        self.channels.extend(channels);
        self
    }

    pub fn with_locations<S: Into<String>>(mut self, locations: impl IntoIterator<Item = S>) -> Self {
        self.locations.extend(locations.into_iter().map(Into::into));
        self
    }

    pub fn matches(&self, record: &LogRecord) -> bool {
        (self.levels.is_empty() || self.levels.contains(&record.level))
            && (self.channels.is_empty() || self.channels.contains(&record.channel))
            && (self.locations.is_empty()
                || self.locations.contains(&record.file_name)
                || self.locations.contains(&record.location()))
    }
}

/// Wraps a sink so it only receives records passing `filter`. Notifications always pass.
#[derive(Debug, Clone)]
pub struct Filtered<S> {
    filter: RecordFilter,
    inner: S,
}

impl<S: Sink> Filtered<S> {
    pub fn new(filter: RecordFilter, inner: S) -> Self {
        Self { filter, inner }
    }

    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Sink> Sink for Filtered<S> {
    fn deliver(&self, received_at: DateTime<Utc>, record: &LogRecord) {
        if self.filter.matches(record) {
            self.inner.deliver(received_at, record);
        }
    }

    fn status_message(&self, message: &str) {
        self.inner.status_message(message);
    }

    fn error_message(&self, message: &str) {
        self.inner.error_message(message);
    }

    fn fatal_error(&self, message: &str) {
        self.inner.fatal_error(message);
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
