//! Out-of-band probe commands

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// An action the connection manager performs on a freshly opened session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Program the configured firmware image, then reset the target on the next session.
    Flash,
    ResetTarget,
    /// Close the probe and open it again.
    ResetProbe,
}

#[derive(Debug, Default)]
struct Flags {
    flash: AtomicBool,
    target_reset: AtomicBool,
    probe_reset: AtomicBool,
}

/// Edge-triggered command flags shared between operators and the connection manager.
///
/// Any task may set a flag at any time. Only the manager clears them, once the action
/// succeeded, so a command that fails stays pending and is retried with the next session.
/// Requesting an already pending command has no further effect.
#[derive(Debug, Clone, Default)]
pub struct CommandHandle {
    flags: Arc<Flags>,
}

impl CommandHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_target_reset(&self) {
        debug!("Target reset requested");
        self.flags.target_reset.store(true, Ordering::Release);
    }

    pub fn request_probe_reset(&self) {
        debug!("Probe reset requested");
        self.flags.probe_reset.store(true, Ordering::Release);
    }

    pub fn request_flash(&self) {
        debug!("Flash requested");
        self.flags.flash.store(true, Ordering::Release);
    }

    pub fn is_flash_pending(&self) -> bool {
        self.flags.flash.load(Ordering::Acquire)
    }

    /// Whether any command waits for the next session.
    pub fn is_pending(&self) -> bool {
        self.is_flash_pending()
            || self.flags.target_reset.load(Ordering::Acquire)
            || self.flags.probe_reset.load(Ordering::Acquire)
    }

    /// Highest-priority pending command: flash, then target reset, then probe reset.
    /// The flag stays set until [`CommandHandle::complete`].
    pub(crate) fn next(&self) -> Option<Command> {
        [Command::Flash, Command::ResetTarget, Command::ResetProbe]
            .into_iter()
            .find(|command| self.flag(*command).load(Ordering::Acquire))
    }

    /// Clear the flag of a command that has been carried out.
    pub(crate) fn complete(&self, command: Command) {
        self.flag(command).store(false, Ordering::Release);
    }

    fn flag(&self, command: Command) -> &AtomicBool {
        match command {
            Command::Flash => &self.flags.flash,
            Command::ResetTarget => &self.flags.target_reset,
            Command::ResetProbe => &self.flags.probe_reset,
        }
    }
}
