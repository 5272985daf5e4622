//! Process-wide `tracing` setup
//!
//! Library code only emits events. Applications embedding the crate call [`init`] once
//! at startup, or install their own subscriber.
//!
//! `RUST_LOG` overrides the default directive, e.g. `RUST_LOG=rttlog=debug` or
//! `RUST_LOG=rttlog::device=trace` to see every record re-emitted by
//! [`TracingSink`](crate::sink::TracingSink).

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::{Result, RttError};

/// Directive used when neither the caller nor `RUST_LOG` provide one.
pub const DEFAULT_DIRECTIVE: &str = "rttlog=info";

/// Filter from `RUST_LOG`, falling back to `default_directive`.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install a stderr fmt subscriber filtered by [`env_filter`].
///
/// Fails when a global subscriber is already installed.
pub fn init(default_directive: &str) -> Result<()> {
    fmt()
        .with_env_filter(env_filter(default_directive))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
        .map_err(|e| RttError::config(format!("failed to install tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_without_panicking() {
        let _ = init(DEFAULT_DIRECTIVE);
        let second = init("debug");
        assert!(matches!(second, Err(RttError::Config { .. })));
    }

    #[test]
    fn fallback_directive_is_used() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(env_filter("rttlog=warn").to_string(), "rttlog=warn");
        }
    }
}
