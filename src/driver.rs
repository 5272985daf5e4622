//! Connection manager: owns the probe session lifecycle
//!
//! One task opens the probe, runs at most one pending command, starts the RTT transport
//! and then polls every channel until the session is lost, a command arrives or the
//! manager is cancelled. Every failure is reported to the notifier and followed by a
//! reconnect; nothing short of cancellation stops the loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::catalog::Catalog;
use crate::channel::ChannelReader;
use crate::config::RttConfig;
use crate::connection::{Command, CommandHandle};
use crate::decoder::WireDecoder;
use crate::probe::{Probe, ProbeSession};
use crate::queue::QueueHandle;
use crate::sink::Sink;
use crate::types::{ConnectionState, LogRecord, ProbeStatus};
use crate::{Result, RttError};

/// Handles to a running connection manager.
pub struct DriverChannels {
    /// Latest probe status, reset to not-running whenever a session ends.
    pub status: watch::Receiver<ProbeStatus>,
    pub state: watch::Receiver<ConnectionState>,
    pub commands: CommandHandle,
    /// Cancels the manager task.
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

/// Why a session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    /// A command ran, or became pending, and needs a fresh session.
    Restart,
    /// No channel produced a record within the idle timeout.
    Idle,
}

/// Spawns the connection manager task.
pub struct Driver;

impl Driver {
    /// Spawn the manager for `probe`.
    ///
    /// Decoded records are appended to `queue`; progress and failures go to `notifier`.
    /// The configuration is expected to be validated already.
    pub fn spawn<P>(
        probe: P,
        decoder: Arc<dyn WireDecoder>,
        config: RttConfig,
        queue: QueueHandle<Arc<LogRecord>>,
        notifier: Arc<dyn Sink>,
    ) -> DriverChannels
    where
        P: Probe,
    {
        let (status_tx, status_rx) = watch::channel(ProbeStatus::not_running());
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let commands = CommandHandle::new();
        let cancel = CancellationToken::new();

        let manager = Manager {
            probe,
            decoder,
            config,
            queue,
            notifier,
            commands: commands.clone(),
            status_tx,
            state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(manager.run());

        DriverChannels { status: status_rx, state: state_rx, commands, cancel, task }
    }
}

struct Manager<P: Probe> {
    probe: P,
    decoder: Arc<dyn WireDecoder>,
    config: RttConfig,
    queue: QueueHandle<Arc<LogRecord>>,
    notifier: Arc<dyn Sink>,
    commands: CommandHandle,
    status_tx: watch::Sender<ProbeStatus>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl<P: Probe> Manager<P> {
    async fn run(self) {
        info!(
            device = %self.config.probe.device,
            speed_khz = self.config.probe.speed_khz,
            channels = self.config.channels,
            "Connection manager started"
        );
        let mut sessions = 0u64;

        while !self.cancel.is_cancelled() {
            self.set_state(ConnectionState::Connecting);
            self.notifier.status_message("opening probe");
            sessions += 1;
            debug!(session = sessions, "Opening probe session");

            let outcome = self.session_cycle().await;
            self.status_tx.send_replace(ProbeStatus::not_running());

            match outcome {
                Ok(SessionEnd::Cancelled) => break,
                Ok(SessionEnd::Restart) => {
                    debug!(session = sessions, "Session closed for pending command");
                }
                Ok(SessionEnd::Idle) => {
                    let idle = self.config.timing.idle_timeout();
                    warn!(session = sessions, ?idle, "No records received, restarting session");
                    self.notifier.error_message(&format!(
                        "no data received for {}ms, restarting session",
                        idle.as_millis()
                    ));
                    self.set_state(ConnectionState::Reconnecting);
                }
                Err(e) => {
                    let message = format!("probe session failed: {e}");
                    if e.is_retryable() {
                        warn!(session = sessions, error = %e, "Probe session failed");
                        self.notifier.error_message(&message);
                    } else {
                        error!(
                            session = sessions,
                            error = %e,
                            suggestions = ?e.recovery_suggestions(),
                            "Probe session failed, retrying will not help until fixed"
                        );
                        self.notifier.fatal_error(&message);
                    }
                    self.set_state(ConnectionState::Reconnecting);
                    if self.pause(self.config.timing.reconnect_backoff()).await {
                        break;
                    }
                }
            }
            self.notifier.status_message("probe closed");
        }

        self.set_state(ConnectionState::Disconnected);
        self.status_tx.send_replace(ProbeStatus::not_running());
        info!(sessions, "Connection manager stopped");
    }

    /// Open one session and run it to its end. The session and the channel readers are
    /// dropped on return.
    async fn session_cycle(&self) -> Result<SessionEnd> {
        // The previous session is already closed, so reopening performs the reset.
        if self.commands.next() == Some(Command::ResetProbe) {
            self.set_state(ConnectionState::ResettingProbe);
            info!("Resetting probe");
            self.notifier.status_message("resetting probe");
            self.commands.complete(Command::ResetProbe);
        }

        let opened = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            opened = self.probe.open(&self.config.probe) => opened,
        };
        let mut session = opened?;
        debug!("Probe opened");

        match self.commands.next() {
            None => {}
            // Requested while opening; handled before the next open.
            Some(Command::ResetProbe) => return Ok(SessionEnd::Restart),
            Some(command) => {
                self.run_command(&mut session, command).await?;
                return Ok(SessionEnd::Restart);
            }
        }

        let address = self.config.control_block.resolve()?;
        session.start_transport(self.config.channels, address).await?;
        let catalog = match &self.config.catalog {
            Some(source) => source.load()?,
            None => Catalog::default(),
        };

        self.set_state(ConnectionState::Active);
        info!(
            channels = self.config.channels,
            address = %format!("{address:#010x}"),
            templates = catalog.len(),
            "RTT transport started"
        );
        self.notifier.status_message(&format!(
            "transport started with {} channels, control block at {address:#010x}",
            self.config.channels
        ));

        self.poll_session(&mut session, &catalog).await
    }

    /// A command's flag is cleared only once it succeeded, so a failed flash or reset is
    /// retried on the next session. Commands are not raced against cancellation.
    async fn run_command(&self, session: &mut P::Session, command: Command) -> Result<()> {
        info!(?command, "Running probe command");
        match command {
            Command::Flash => {
                self.set_state(ConnectionState::Flashing);
                let Some(image) = self.config.firmware.as_deref() else {
                    // Retrying cannot help while the configuration has no image.
                    self.commands.complete(Command::Flash);
                    return Err(RttError::config("flash requested but no firmware image is configured"));
                };
                self.notifier.status_message(&format!("flashing {}", image.display()));
                session.flash(image).await?;
                self.notifier.status_message("flashing succeeded");
                self.commands.request_target_reset();
            }
            Command::ResetTarget => {
                self.set_state(ConnectionState::ResettingTarget);
                self.notifier.status_message("resetting target");
                session.reset_target().await?;
                self.notifier.status_message("target reset succeeded");
            }
            Command::ResetProbe => return Ok(()),
        }
        self.commands.complete(command);
        Ok(())
    }

    async fn poll_session(&self, session: &mut P::Session, catalog: &Catalog) -> Result<SessionEnd> {
        let timing = &self.config.timing;
        let mut readers: Vec<ChannelReader> =
            (0..self.config.channels).map(|index| ChannelReader::new(index, timing)).collect();
        let mut produced = Vec::new();
        let mut last_record = Instant::now();
        let mut last_halt: Option<Instant> = None;
        let mut rounds = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(SessionEnd::Cancelled);
            }
            if self.commands.is_pending() {
                return Ok(SessionEnd::Restart);
            }

            let mut got_record = false;
            for reader in &mut readers {
                got_record |= reader
                    .poll(session, &*self.decoder, catalog, &*self.notifier, &mut produced)
                    .await?;
            }
            if !produced.is_empty() {
                trace!(round = rounds, records = produced.len(), "Records decoded");
            }
            for record in produced.drain(..) {
                self.queue.append(Arc::new(record));
            }

            let now = Instant::now();
            if got_record {
                last_record = now;
            }
            if session.is_halted().await? {
                last_halt = Some(now);
            }

            let status = session.status().await?;
            self.status_tx.send_replace(status);
            if !status.running {
                return Err(RttError::session_lost("probe reports the transport is not running"));
            }
            if status.up_channels != self.config.channels {
                return Err(RttError::session_lost(format!(
                    "probe reports {} up-channels, expected {}",
                    status.up_channels, self.config.channels
                )));
            }

            let idle = now.duration_since(last_record) > timing.idle_timeout();
            let halted_recently =
                last_halt.is_some_and(|halt| now.duration_since(halt) <= timing.halt_grace());
            if idle && !halted_recently {
                return Ok(SessionEnd::Idle);
            }

            rounds += 1;
            if self.pause(timing.poll_pause()).await {
                return Ok(SessionEnd::Cancelled);
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Sleep for `duration`. Returns `true` when cancelled first.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }
}
