//! Bounded-delay reordering
//!
//! Channels are polled one after another, so records from different channels reach the
//! host out of device-time order. [`ReorderQueue`] holds every record for a fixed grace
//! period after arrival, then releases due records sorted by their ordering key. Nothing
//! is delivered before `arrival + release_delay`, and everything is delivered within
//! roughly one `release_interval` after that.
//!
//! ```rust
//! use rttlog::queue::{QueueTiming, ReorderQueue};
//! use rttlog::types::LogRecord;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let queue = ReorderQueue::spawn(QueueTiming::default(), |received_at, record: &Arc<LogRecord>| {
//!     println!("{received_at} {}", record.message);
//! });
//! queue.append(Arc::new(LogRecord::plain(0, "hello")));
//! queue.shutdown().await;
//! # }
//! ```

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::TimingConfig;
use crate::types::{DeviceTime, LogRecord};

/// Items that carry their own release ordering.
pub trait Reorderable: Send + 'static {
    type Key: Ord;

    fn reorder_key(&self) -> Self::Key;
}

impl Reorderable for LogRecord {
    type Key = DeviceTime;

    fn reorder_key(&self) -> DeviceTime {
        self.device_time
    }
}

impl<T: Reorderable + Sync> Reorderable for Arc<T> {
    type Key = T::Key;

    fn reorder_key(&self) -> T::Key {
        (**self).reorder_key()
    }
}

/// Release timing of a [`ReorderQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTiming {
    /// Minimum time an entry stays buffered.
    pub release_delay: Duration,
    /// Longest sleep of the release task between checks.
    pub release_interval: Duration,
}

impl Default for QueueTiming {
    fn default() -> Self {
        Self { release_delay: Duration::from_millis(200), release_interval: Duration::from_millis(50) }
    }
}

impl From<&TimingConfig> for QueueTiming {
    fn from(timing: &TimingConfig) -> Self {
        Self { release_delay: timing.release_delay(), release_interval: timing.release_interval() }
    }
}

struct Pending<T> {
    arrival: Instant,
    received_at: DateTime<Utc>,
    seq: u64,
    item: T,
}

struct Buffer<T> {
    entries: Vec<Pending<T>>,
    next_seq: u64,
}

struct Shared<T> {
    buffer: Mutex<Buffer<T>>,
    notify: Notify,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Buffer<T>> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cloneable append side of a [`ReorderQueue`].
pub struct QueueHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for QueueHandle<T> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<T: Reorderable> QueueHandle<T> {
    /// Buffer `item`, stamped with the current monotonic and wall-clock time.
    pub fn append(&self, item: T) {
        {
            let mut buffer = self.shared.lock();
            let seq = buffer.next_seq;
            buffer.next_seq += 1;
            buffer.entries.push(Pending { arrival: Instant::now(), received_at: Utc::now(), seq, item });
        }
        self.shared.notify.notify_one();
    }

    /// Entries not yet released.
    pub fn pending(&self) -> usize {
        self.shared.lock().entries.len()
    }
}

/// Delay queue releasing entries in key order.
///
/// Owns a release task that calls the consumer for every due entry. Dropping the queue
/// (or calling [`ReorderQueue::shutdown`]) cancels the task; entries still buffered at
/// that point are dropped, not flushed.
pub struct ReorderQueue<T> {
    handle: QueueHandle<T>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T: Reorderable> ReorderQueue<T> {
    /// Spawn the release task on the current runtime.
    pub fn spawn<F>(timing: QueueTiming, consumer: F) -> Self
    where
        F: FnMut(DateTime<Utc>, &T) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            buffer: Mutex::new(Buffer { entries: Vec::new(), next_seq: 0 }),
            notify: Notify::new(),
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(release_task(shared.clone(), timing, cancel.clone(), consumer));
        Self { handle: QueueHandle { shared }, cancel, task: Some(task) }
    }

    pub fn append(&self, item: T) {
        self.handle.append(item);
    }

    pub fn handle(&self) -> QueueHandle<T> {
        self.handle.clone()
    }

    pub fn pending(&self) -> usize {
        self.handle.pending()
    }

    /// Stop releasing. Buffered entries are dropped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the release task and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl<T> Drop for ReorderQueue<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn release_task<T, F>(
    shared: Arc<Shared<T>>,
    timing: QueueTiming,
    cancel: CancellationToken,
    mut consumer: F,
) where
    T: Reorderable,
    F: FnMut(DateTime<Utc>, &T),
{
    debug!(?timing, "Reorder queue started");
    let mut released = 0u64;

    'run: loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = shared.notify.notified() => {}
            _ = tokio::time::sleep(timing.release_interval) => {}
        }

        let batch = take_due(&shared, Instant::now(), timing.release_delay);
        if !batch.is_empty() {
            trace!(count = batch.len(), "Releasing entries");
        }
        for entry in batch {
            if cancel.is_cancelled() {
                break 'run;
            }
            consumer(entry.received_at, &entry.item);
            released += 1;
        }
    }

    debug!(released, dropped = shared.lock().entries.len(), "Reorder queue stopped");
}

/// Remove entries that arrived at or before `now - delay`, sorted by `(key, seq)`.
fn take_due<T: Reorderable>(shared: &Shared<T>, now: Instant, delay: Duration) -> Vec<Pending<T>> {
    let Some(threshold) = now.checked_sub(delay) else {
        return Vec::new();
    };

    let mut due = {
        let mut buffer = shared.lock();
        let entries = std::mem::take(&mut buffer.entries);
        let (due, keep): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.arrival <= threshold);
        buffer.entries = keep;
        due
    };

    due.sort_by_cached_key(|entry| (entry.item.reorder_key(), entry.seq));
    due
}
