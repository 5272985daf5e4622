//! Live RTT connection

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::CommandHandle;
use crate::config::RttConfig;
use crate::decoder::WireDecoder;
use crate::driver::Driver;
use crate::probe::Probe;
use crate::queue::{QueueTiming, ReorderQueue};
use crate::sink::{BroadcastSink, Sink, SinkSet, broadcast::DEFAULT_CAPACITY};
use crate::stream::ThrottleExt;
use crate::types::{ConnectionState, LogRecord, ProbeStatus, TimedRecord, UpdateRate};
use crate::Result;

/// A running pipeline from one debug probe to a set of sinks.
///
/// Records flow from the connection manager through the reorder queue to the sinks
/// and to every [`LiveConnection::subscribe`] stream. Dropping the connection cancels
/// both tasks; [`LiveConnection::shutdown`] also waits for them.
pub struct LiveConnection {
    status: watch::Receiver<ProbeStatus>,
    state: watch::Receiver<ConnectionState>,
    commands: CommandHandle,
    broadcast: Arc<BroadcastSink>,
    source_hz: f64,
    cancel: CancellationToken,
    driver: Option<JoinHandle<()>>,
    queue: Option<ReorderQueue<Arc<LogRecord>>>,
}

impl LiveConnection {
    /// Validate `config` and start the connection manager and the reorder queue.
    ///
    /// Returns as soon as the tasks are spawned; the probe is opened in the background
    /// and retried until it succeeds. Must be called inside a tokio runtime.
    pub async fn start<P, D>(probe: P, decoder: D, config: RttConfig, sinks: SinkSet) -> Result<Self>
    where
        P: Probe,
        D: WireDecoder,
    {
        config.validate()?;
        info!(
            device = %config.probe.device,
            channels = config.channels,
            sinks = ?sinks,
            "Starting live RTT connection"
        );

        let sinks = Arc::new(sinks);
        let broadcast = Arc::new(BroadcastSink::new(DEFAULT_CAPACITY));
        let source_hz = UpdateRate::source_hz_for(config.timing.poll_pause());

        let deliver_to = sinks.clone();
        let publisher = broadcast.clone();
        let queue = ReorderQueue::spawn(
            QueueTiming::from(&config.timing),
            move |received_at, record: &Arc<LogRecord>| {
                deliver_to.deliver(received_at, record);
                publisher.publish(TimedRecord::new(received_at, record.clone()));
            },
        );

        let channels = Driver::spawn(probe, Arc::new(decoder), config, queue.handle(), sinks);

        Ok(Self {
            status: channels.status,
            state: channels.state,
            commands: channels.commands,
            broadcast,
            source_hz,
            cancel: channels.cancel,
            driver: Some(channels.task),
            queue: Some(queue),
        })
    }

    /// Records released from now on, in release order.
    ///
    /// A subscriber that falls more than the broadcast capacity behind skips the
    /// records it missed.
    pub fn subscribe(&self) -> impl Stream<Item = TimedRecord> + Send + 'static {
        self.broadcast.subscribe()
    }

    /// Latest probe status.
    pub fn status(&self) -> ProbeStatus {
        *self.status.borrow()
    }

    /// Probe status snapshots, starting with the current one.
    ///
    /// The manager publishes once per poll round; a throttled rate keeps the latest
    /// snapshot of each interval.
    pub fn status_updates(&self, rate: UpdateRate) -> impl Stream<Item = ProbeStatus> + Send + 'static {
        let updates = WatchStream::new(self.status.clone());
        match rate.throttle_interval(self.source_hz) {
            None => updates.boxed(),
            Some(interval) => updates.throttle(interval).boxed(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Connection state changes, starting with the current state.
    pub fn state_updates(&self) -> impl Stream<Item = ConnectionState> + Send + 'static {
        WatchStream::new(self.state.clone())
    }

    /// Handle for issuing commands from other tasks.
    pub fn commands(&self) -> CommandHandle {
        self.commands.clone()
    }

    pub fn request_target_reset(&self) {
        self.commands.request_target_reset();
    }

    pub fn request_probe_reset(&self) {
        self.commands.request_probe_reset();
    }

    pub fn request_flash(&self) {
        self.commands.request_flash();
    }

    pub fn is_flash_pending(&self) -> bool {
        self.commands.is_flash_pending()
    }

    /// Rate at which the manager publishes status snapshots.
    pub fn source_hz(&self) -> f64 {
        self.source_hz
    }

    /// Stop the connection manager, then the reorder queue.
    ///
    /// Records still waiting in the queue are dropped.
    pub async fn shutdown(mut self) {
        info!("Shutting down live RTT connection");
        self.cancel.cancel();
        if let Some(driver) = self.driver.take() {
            let _ = driver.await;
        }
        if let Some(queue) = self.queue.take() {
            queue.shutdown().await;
        }
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        debug!("Dropping live RTT connection");
        self.cancel.cancel();
    }
}
