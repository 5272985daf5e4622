//! Probe status snapshots and connection states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Last status reported by the probe's RTT transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeStatus {
    /// Whether the transport is running on the probe.
    pub running: bool,
    /// Total bytes read from the target since the transport started.
    pub bytes_read: u64,
    /// Times the target overwrote unread data.
    pub overflow_count: u64,
    /// Up-buffers (target to host) found in the control block.
    pub up_channels: usize,
    /// Down-buffers (host to target) found in the control block.
    pub down_channels: usize,
}

impl ProbeStatus {
    /// The snapshot published whenever a session ends.
    pub fn not_running() -> Self {
        Self::default()
    }
}

/// Where the connection manager is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Active,
    Reconnecting,
    Flashing,
    ResettingTarget,
    ResettingProbe,
}

impl ConnectionState {
    pub fn is_active(self) -> bool {
        self == ConnectionState::Active
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Active => "active",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Flashing => "flashing",
            ConnectionState::ResettingTarget => "resetting target",
            ConnectionState::ResettingProbe => "resetting probe",
        };
        f.write_str(name)
    }
}
