//! Live, time-ordered log and metric streams from microcontroller RTT channels.
//!
//! Firmware writes compact log frames into RTT up-channels in target RAM; a debug probe
//! reads them out while the target runs. This crate supervises the probe session,
//! decodes the frames into structured [`LogRecord`]s, restores device-time order across
//! channels and hands the result to pluggable sinks.
//!
//! # Features
//!
//! - **Self-healing sessions**: reconnects after transport errors, lost control blocks and
//!   silent targets, with a grace period for targets halted in a debugger
//! - **Exact device time**: unit-annotated timestamps kept as exact fractions of seconds
//! - **Ordered delivery**: records from all channels released in device-time order
//! - **Sinks**: `.rttlog` record files, `tracing` events, subscription streams, metrics
//! - **Commands**: flash firmware and reset target or probe without stopping the pipeline
//!
//! # Pipeline
//!
//! probe bytes → [`channel::ChannelReader`] (one per channel) → [`parser`] →
//! [`queue::ReorderQueue`] → [`sink::Sink`]s
//!
//! The probe driver and the wire decoder are supplied by the application through the
//! [`probe::Probe`] and [`decoder::WireDecoder`] traits.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use rttlog::RttLog;
//! use rttlog::decoder::LineDecoder;
//! use rttlog::probe::Probe;
//! use rttlog::sink::{CsvFileSink, SinkSet, TracingSink};
//! use std::path::Path;
//!
//! async fn run(probe: impl Probe) -> rttlog::Result<()> {
//!     let sinks = SinkSet::new()
//!         .with(TracingSink)
//!         .with(CsvFileSink::create_in(Path::new("logs"))?);
//!     let connection = RttLog::start_from_file(probe, LineDecoder, Path::new("rtt.yaml"), sinks).await?;
//!
//!     let mut records = connection.subscribe();
//!     while let Some(timed) = records.next().await {
//!         println!("{} {}", timed.record.device_time, timed.record.message);
//!     }
//!     Ok(())
//! }
//! ```

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoding
pub mod catalog;
pub mod decoder;
pub mod metric;
pub mod parser;
pub mod symbol_map;

// Session and delivery
pub mod channel;
pub mod config;
pub mod connection;
pub mod driver;
pub mod probe;
pub mod queue;
pub mod sink;
pub mod stream;

pub mod logging;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::RttConfig;
pub use connection::{CommandHandle, LiveConnection};

use std::path::Path;

use crate::decoder::WireDecoder;
use crate::probe::Probe;
use crate::sink::SinkSet;

/// Entry point for RTT log connections.
///
/// # Examples
///
/// ```rust,no_run
/// use rttlog::{RttConfig, RttLog};
/// use rttlog::config::ProbeTarget;
/// use rttlog::decoder::LineDecoder;
/// use rttlog::probe::Probe;
/// use rttlog::sink::{SinkSet, TracingSink};
/// use rttlog::symbol_map::ControlBlockLocation;
///
/// # async fn example(probe: impl Probe) -> rttlog::Result<()> {
/// let config = RttConfig::new(
///     ProbeTarget::new("NRF52840_XXAA"),
///     2,
///     ControlBlockLocation::map_file("build/firmware.map"),
/// );
/// let connection = RttLog::start(probe, LineDecoder, config, SinkSet::new().with(TracingSink)).await?;
/// connection.request_target_reset();
/// # Ok(())
/// # }
/// ```
pub struct RttLog;

impl RttLog {
    /// Start streaming from `probe` with an in-memory configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RttError::Config`] when the configuration fails validation. Probe and
    /// transport failures are not returned: the connection keeps retrying and reports
    /// them to the sinks.
    pub async fn start<P, D>(probe: P, decoder: D, config: RttConfig, sinks: SinkSet) -> Result<LiveConnection>
    where
        P: Probe,
        D: WireDecoder,
    {
        LiveConnection::start(probe, decoder, config, sinks).await
    }

    /// Start streaming from `probe` with a YAML or JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub async fn start_from_file<P, D>(
        probe: P,
        decoder: D,
        config_path: &Path,
        sinks: SinkSet,
    ) -> Result<LiveConnection>
    where
        P: Probe,
        D: WireDecoder,
    {
        let config = RttConfig::load(config_path)?;
        LiveConnection::start(probe, decoder, config, sinks).await
    }
}
