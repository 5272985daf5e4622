//! In-process record subscriptions

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use super::Sink;
use crate::types::{LogRecord, TimedRecord};

/// Default number of records a slow subscriber may fall behind before it skips ahead.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Publishes released records to any number of async subscribers.
///
/// Subscribers that fall more than the channel capacity behind lose the oldest records;
/// the gap is logged and the stream continues with the newest ones.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<TimedRecord>,
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an already shared record without copying it.
    pub fn publish(&self, record: TimedRecord) {
        // no subscribers is fine
        let _ = self.sender.send(record);
    }

    /// Records published from now on.
    pub fn subscribe(&self) -> impl Stream<Item = TimedRecord> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|item| async move {
                match item {
                    Ok(record) => Some(record),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Record subscriber lagged");
                        None
                    }
                }
            })
            .boxed()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Sink for BroadcastSink {
    fn deliver(&self, received_at: DateTime<Utc>, record: &LogRecord) {
        if self.sender.receiver_count() > 0 {
            self.publish(TimedRecord::new(received_at, Arc::new(record.clone())));
        }
    }

    fn name(&self) -> &str {
        "broadcast"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_records_in_order() {
        let sink = BroadcastSink::new(16);
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 2);

        let now = Utc::now();
        sink.deliver(now, &LogRecord::plain(0, "a"));
        sink.publish(TimedRecord::new(now, Arc::new(LogRecord::plain(1, "b"))));

        for stream in [&mut first, &mut second] {
            assert_eq!(stream.next().await.unwrap().record.message, "a");
            let b = stream.next().await.unwrap();
            assert_eq!(b.record.message, "b");
            assert_eq!(b.received_at, now);
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let sink = BroadcastSink::new(2);
        let mut stream = sink.subscribe();
        for i in 0..5 {
            sink.deliver(Utc::now(), &LogRecord::plain(0, i.to_string()));
        }
        assert_eq!(stream.next().await.unwrap().record.message, "3");
        assert_eq!(stream.next().await.unwrap().record.message, "4");
    }

    #[tokio::test]
    async fn stream_ends_when_sink_is_dropped() {
        let sink = BroadcastSink::new(4);
        let mut stream = sink.subscribe();
        drop(sink);
        assert!(stream.next().await.is_none());
    }
}
