//! Error types for RTT log ingestion.
//!
//! Every fallible operation in the crate returns [`RttError`]. Errors carry structured
//! context and classify themselves as retryable or not, which the connection manager
//! uses to decide whether a failure is reported as an ordinary error or as a fatal
//! configuration problem. Neither kind stops the manager: it keeps retrying until it is
//! cancelled.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: the debug probe could not be opened
//! - **Transport Errors**: a channel read, status query, flash or reset failed
//! - **Session Loss**: the probe stopped running or the channel layout changed
//! - **File Errors**: catalog, map, firmware or record files could not be accessed
//! - **Parse Errors**: malformed catalogs, configs or literals
//! - **Configuration Errors**: invalid settings or unresolved control-block symbols
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use rttlog::RttError;
//!
//! let error = RttError::connection_failed("probe not found on USB");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for RTT operations.
pub type Result<T, E = RttError> = std::result::Result<T, E>;

/// Main error type for RTT operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RttError {
    #[error("Failed to open debug probe: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Transport operation '{operation}' failed")]
    Transport {
        operation: String,
        channel: Option<usize>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Probe session lost: {reason}")]
    SessionLost { reason: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Symbol '{symbol}' not found in map file {path}")]
    SymbolNotFound { symbol: String, path: PathBuf },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl RttError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RttError::Connection { .. } => true,
            RttError::Transport { .. } => true,
            RttError::SessionLost { .. } => true,
            RttError::File { .. } => false,
            RttError::Parse { .. } => false,
            RttError::SymbolNotFound { .. } => false,
            RttError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RttError::Connection { .. } => vec![
                "Check the probe is plugged in and not claimed by another tool",
                "Verify the configured device name and host address",
                "Lower the interface speed",
            ],
            RttError::Transport { .. } => vec![
                "Check the target is powered",
                "Inspect the debug cable and connector",
                "Lower the interface speed",
            ],
            RttError::SessionLost { .. } => vec![
                "Verify the firmware initializes the RTT control block",
                "Check the configured channel count matches the firmware",
                "Check whether the target reset or lost power",
            ],
            RttError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check the directory is writable",
            ],
            RttError::Parse { .. } => vec![
                "Regenerate the file from the current firmware build",
                "Verify the file format",
            ],
            RttError::SymbolNotFound { .. } => vec![
                "Rebuild the firmware so the map file is current",
                "Check the configured control block symbol name",
                "Configure a fixed control block address instead",
            ],
            RttError::Config { .. } => vec!["Fix the reported setting in the configuration"],
        }
    }

    /// Helper constructor for probe connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        RttError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for probe connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RttError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for transport errors.
    pub fn transport(operation: impl Into<String>, channel: Option<usize>) -> Self {
        RttError::Transport { operation: operation.into(), channel, source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_with_source(
        operation: impl Into<String>,
        channel: Option<usize>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RttError::Transport { operation: operation.into(), channel, source: Some(source) }
    }

    /// Helper constructor for session loss.
    pub fn session_lost(reason: impl Into<String>) -> Self {
        RttError::SessionLost { reason: reason.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        RttError::File { path, source }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        RttError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        RttError::Config { reason: reason.into() }
    }
}

impl From<std::io::Error> for RttError {
    fn from(err: std::io::Error) -> Self {
        RttError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
