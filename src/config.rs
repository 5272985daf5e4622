//! Session configuration
//!
//! [`RttConfig`] is loaded from YAML or JSON:
//!
//! ```yaml
//! probe:
//!   device: STM32G474RE
//!   speed_khz: 16000
//! channels: 3
//! control_block:
//!   map_file:
//!     path: build/firmware.map
//! catalog: build/string_constants.json
//! firmware: build/firmware.hex
//! timing:
//!   idle_timeout_ms: 10000
//! ```
//!
//! Every timing field is optional and defaults to the values in [`TimingConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::CatalogSource;
use crate::symbol_map::ControlBlockLocation;
use crate::{Result, RttError};

/// Identity of the debug probe session to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTarget {
    /// Target device name as understood by the probe driver.
    pub device: String,
    /// Interface clock in kHz.
    #[serde(default = "default_speed_khz")]
    pub speed_khz: u32,
    /// Remote probe server, when the probe is not attached locally.
    #[serde(default)]
    pub host: Option<String>,
}

fn default_speed_khz() -> u32 {
    4000
}

impl ProbeTarget {
    pub fn new(device: impl Into<String>) -> Self {
        Self { device: device.into(), speed_khz: default_speed_khz(), host: None }
    }
}

/// Complete configuration of one RTT connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RttConfig {
    pub probe: ProbeTarget,
    /// Up-channels the firmware exposes; a session whose probe reports a different count
    /// is treated as lost.
    pub channels: usize,
    /// Written as a one-key mapping, `address: 0x20000000` or `map_file: {path: ...}`.
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    pub control_block: ControlBlockLocation,
    /// Catalog for the wire decoder. Sessions run with an empty catalog when unset.
    #[serde(default)]
    pub catalog: Option<CatalogSource>,
    /// Image written by a flash command.
    #[serde(default)]
    pub firmware: Option<PathBuf>,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Timing parameters, all in milliseconds except the read chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Quiet interval after which a channel drops one undecodable byte.
    pub stall_timeout_ms: u64,
    /// Session is considered lost when no channel produced a record for this long.
    pub idle_timeout_ms: u64,
    /// Suppresses the idle timeout for this long after the target was last seen halted.
    pub halt_grace_ms: u64,
    /// Pause before reconnecting after an error.
    pub reconnect_backoff_ms: u64,
    /// Pause between poll rounds.
    pub poll_pause_ms: u64,
    /// Minimum time a record waits in the reorder queue.
    pub release_delay_ms: u64,
    /// Wake-up period of the reorder queue.
    pub release_interval_ms: u64,
    /// Bytes requested per channel read.
    pub read_chunk: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            stall_timeout_ms: 100,
            idle_timeout_ms: 5_000,
            halt_grace_ms: 60_000,
            reconnect_backoff_ms: 1_000,
            poll_pause_ms: 1,
            release_delay_ms: 200,
            release_interval_ms: 50,
            read_chunk: 32_768,
        }
    }
}

impl TimingConfig {
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn halt_grace(&self) -> Duration {
        Duration::from_millis(self.halt_grace_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn poll_pause(&self) -> Duration {
        Duration::from_millis(self.poll_pause_ms)
    }

    pub fn release_delay(&self) -> Duration {
        Duration::from_millis(self.release_delay_ms)
    }

    pub fn release_interval(&self) -> Duration {
        Duration::from_millis(self.release_interval_ms)
    }
}

impl RttConfig {
    /// Configuration with default timing and no catalog or firmware image.
    pub fn new(probe: ProbeTarget, channels: usize, control_block: ControlBlockLocation) -> Self {
        Self {
            probe,
            channels,
            control_block,
            catalog: None,
            firmware: None,
            timing: TimingConfig::default(),
        }
    }

    /// Parse and validate a YAML or JSON document.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(contents)
            .map_err(|e| RttError::parse("configuration", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RttError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe.device.trim().is_empty() {
            return Err(RttError::config("probe.device must not be empty"));
        }
        if self.probe.speed_khz == 0 {
            return Err(RttError::config("probe.speed_khz must be greater than 0"));
        }
        if self.channels == 0 {
            return Err(RttError::config("channels must be greater than 0"));
        }
        if self.timing.release_interval_ms == 0 {
            return Err(RttError::config("timing.release_interval_ms must be greater than 0"));
        }
        if self.timing.read_chunk == 0 {
            return Err(RttError::config("timing.read_chunk must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
probe:
  device: STM32G474RE
  speed_khz: 16000
  host: 192.168.1.20
channels: 3
control_block:
  map_file:
    path: build/firmware.map
catalog: build/string_constants.json
firmware: build/firmware.hex
timing:
  idle_timeout_ms: 10000
"#;

    #[test]
    fn full_document() {
        let config = RttConfig::from_yaml_str(FULL).unwrap();
        assert_eq!(config.probe.host.as_deref(), Some("192.168.1.20"));
        assert_eq!(config.channels, 3);
        assert_eq!(config.control_block, ControlBlockLocation::map_file("build/firmware.map"));
        assert_eq!(config.catalog, Some(CatalogSource::Path("build/string_constants.json".into())));
        assert_eq!(config.timing.idle_timeout(), Duration::from_secs(10));
        assert_eq!(config.timing.stall_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn json_with_fixed_address_and_inline_catalog() {
        let json = r#"{
            "probe": {"device": "nRF52840_xxAA"},
            "channels": 1,
            "control_block": {"address": 536870912},
            "catalog": {"1": "hello {}"}
        }"#;
        let config = RttConfig::from_yaml_str(json).unwrap();
        assert_eq!(config.probe.speed_khz, 4000);
        assert_eq!(config.control_block, ControlBlockLocation::Address(0x2000_0000));
        let catalog = config.catalog.unwrap().load().unwrap();
        assert_eq!(catalog.get(1), Some("hello {}"));
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let base = RttConfig::new(ProbeTarget::new("dev"), 1, ControlBlockLocation::Address(0));
        assert!(base.validate().is_ok());

        let mut zero_channels = base.clone();
        zero_channels.channels = 0;
        assert!(matches!(zero_channels.validate(), Err(RttError::Config { .. })));

        let mut no_device = base.clone();
        no_device.probe.device = "  ".into();
        assert!(no_device.validate().is_err());

        let mut no_interval = base;
        no_interval.timing.release_interval_ms = 0;
        assert!(no_interval.validate().is_err());
    }

    #[test]
    fn hex_address_and_custom_symbol() {
        let yaml = r#"
probe: {device: STM32F407VG}
channels: 2
control_block:
  address: 0x20000400
"#;
        let config = RttConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.control_block, ControlBlockLocation::Address(0x2000_0400));

        let yaml = r#"
probe: {device: STM32F407VG}
channels: 2
control_block:
  map_file: {path: out/app.map, symbol: _SEGGER_RTT}
"#;
        let config = RttConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config.control_block,
            ControlBlockLocation::MapFile { path: "out/app.map".into(), symbol: "_SEGGER_RTT".into() }
        );
    }

    #[test]
    fn serialized_config_loads_back() {
        let mut config = RttConfig::new(
            ProbeTarget::new("NRF52840_XXAA"),
            2,
            ControlBlockLocation::map_file("build/firmware.map"),
        );
        config.firmware = Some("build/firmware.hex".into());
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        assert!(yaml.contains("map_file:"), "{yaml}");
        assert_eq!(RttConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = RttConfig::from_yaml_str("channels: [").unwrap_err();
        assert!(matches!(err, RttError::Parse { .. }));
    }
}
