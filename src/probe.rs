//! Debug probe traits
//!
//! The probe driver's wire-level primitives live outside this crate. A driver binding
//! implements [`Probe`] to open sessions and [`ProbeSession`] for the RTT operations on
//! an open session. All calls may fail with a transport error; the connection manager
//! treats every failure as a reason to drop the session and reconnect.

use std::path::Path;

use crate::Result;
use crate::config::ProbeTarget;
use crate::types::ProbeStatus;

/// Factory for probe sessions.
#[async_trait::async_trait]
pub trait Probe: Send + Sync + 'static {
    type Session: ProbeSession;

    /// Open a session with the configured device, interface speed and optional host.
    ///
    /// May block on USB or network I/O; the connection manager races it against
    /// cancellation.
    async fn open(&self, target: &ProbeTarget) -> Result<Self::Session>;
}

/// One open connection to the debug probe.
///
/// Dropping the session closes it.
#[async_trait::async_trait]
pub trait ProbeSession: Send + 'static {
    /// Start the RTT transport for `channels` up-channels using the control block at `address`.
    async fn start_transport(&mut self, channels: usize, address: u32) -> Result<()>;

    /// Read whatever is available on up-channel `channel` into `buf`.
    ///
    /// Returns the number of bytes written, `0` when the channel is empty.
    async fn read_channel(&mut self, channel: usize, buf: &mut [u8]) -> Result<usize>;

    /// Current transport status.
    async fn status(&mut self) -> Result<ProbeStatus>;

    /// Whether the target core is halted, for example at a breakpoint.
    ///
    /// Probes that cannot tell report `false`.
    async fn is_halted(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// Program `image` into the target.
    async fn flash(&mut self, image: &Path) -> Result<()>;

    /// Reset the target core.
    async fn reset_target(&mut self) -> Result<()>;
}
