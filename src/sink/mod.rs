//! Record sinks
//!
//! A [`Sink`] consumes records in release order from the reorder queue, plus operational
//! notifications from the connection manager. Sinks are synchronous and run on the
//! queue's release task, so they should not block for long; anything slow belongs behind
//! a channel, the way [`BroadcastSink`] hands records to async subscribers.
//!
//! Bundled sinks:
//! - [`CsvFileSink`] writes `.rttlog` record files
//! - [`TracingSink`] re-emits records as `tracing` events
//! - [`BroadcastSink`] feeds in-process subscription streams
//! - [`MetricRegistry`] keeps recent `@METRIC` samples per series
//! - [`Filtered`] restricts any sink by level, channel or source location
//!
//! [`SinkSet`] fans one stream out to several sinks.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::trace;

use crate::types::LogRecord;

pub mod broadcast;
pub mod csv;
pub mod filter;
pub mod metrics;
pub mod tracing_sink;

pub use broadcast::BroadcastSink;
pub use csv::CsvFileSink;
pub use filter::{Filtered, RecordFilter};
pub use metrics::MetricRegistry;
pub use tracing_sink::TracingSink;

/// Consumer of released records and operational notifications.
pub trait Sink: Send + Sync {
    /// A record released by the reorder queue, with its host receipt time.
    fn deliver(&self, received_at: DateTime<Utc>, record: &LogRecord);

    /// Progress of the connection manager ("opening probe", "flashing target", ...).
    fn status_message(&self, _message: &str) {}

    /// Recoverable problems: corrupted data, stalls, lost sessions.
    fn error_message(&self, _message: &str) {}

    /// Problems that will not go away by retrying, such as a missing control-block
    /// symbol. The manager still keeps retrying.
    fn fatal_error(&self, message: &str) {
        self.error_message(message);
    }

    fn name(&self) -> &str {
        "sink"
    }
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn deliver(&self, received_at: DateTime<Utc>, record: &LogRecord) {
        (**self).deliver(received_at, record)
    }

    fn status_message(&self, message: &str) {
        (**self).status_message(message)
    }

    fn error_message(&self, message: &str) {
        (**self).error_message(message)
    }

    fn fatal_error(&self, message: &str) {
        (**self).fatal_error(message)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Fans records and notifications out to every contained sink, in insertion order.
#[derive(Clone, Default)]
pub struct SinkSet {
    sinks: Vec<Arc<dyn Sink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`SinkSet::push`].
    pub fn with(mut self, sink: impl Sink + 'static) -> Self {
        self.push(sink);
        self
    }

    pub fn push(&mut self, sink: impl Sink + 'static) {
        self.sinks.push(Arc::new(sink));
    }

    pub fn push_shared(&mut self, sink: Arc<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl std::fmt::Debug for SinkSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.sinks.iter().map(|sink| sink.name())).finish()
    }
}

impl Sink for SinkSet {
    fn deliver(&self, received_at: DateTime<Utc>, record: &LogRecord) {
        for sink in &self.sinks {
            trace!(sink = sink.name(), channel = record.channel, "Delivering record");
            sink.deliver(received_at, record);
        }
    }

    fn status_message(&self, message: &str) {
        self.sinks.iter().for_each(|sink| sink.status_message(message));
    }

    fn error_message(&self, message: &str) {
        self.sinks.iter().for_each(|sink| sink.error_message(message));
    }

    fn fatal_error(&self, message: &str) {
        self.sinks.iter().for_each(|sink| sink.fatal_error(message));
    }

    fn name(&self) -> &str {
        "sink set"
    }
}
