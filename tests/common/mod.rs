//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rttlog::config::ProbeTarget;
use rttlog::probe::{Probe, ProbeSession};
use rttlog::sink::Sink;
use rttlog::{LogRecord, ProbeStatus, Result, RttError};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Wire {
    channels: Vec<VecDeque<u8>>,
    opened: usize,
}

/// Probe whose channels carry whatever text the test writes into them.
#[derive(Debug, Clone)]
pub struct TextProbe {
    wire: Arc<Mutex<Wire>>,
}

impl TextProbe {
    pub fn new(channels: usize) -> Self {
        let wire = Wire { channels: vec![VecDeque::new(); channels], opened: 0 };
        Self { wire: Arc::new(Mutex::new(wire)) }
    }

    /// Append `line` and a newline to `channel`.
    pub fn write_line(&self, channel: usize, line: &str) {
        let mut wire = self.wire.lock().unwrap();
        let buffer = &mut wire.channels[channel];
        buffer.extend(line.as_bytes());
        buffer.push_back(b'\n');
    }

    pub fn opened(&self) -> usize {
        self.wire.lock().unwrap().opened
    }
}

#[async_trait]
impl Probe for TextProbe {
    type Session = TextSession;

    async fn open(&self, target: &ProbeTarget) -> Result<TextSession> {
        if target.device.is_empty() {
            return Err(RttError::connection_failed("no device"));
        }
        self.wire.lock().unwrap().opened += 1;
        Ok(TextSession { wire: self.wire.clone() })
    }
}

pub struct TextSession {
    wire: Arc<Mutex<Wire>>,
}

#[async_trait]
impl ProbeSession for TextSession {
    async fn start_transport(&mut self, _channels: usize, _address: u32) -> Result<()> {
        Ok(())
    }

    async fn read_channel(&mut self, channel: usize, buf: &mut [u8]) -> Result<usize> {
        let mut wire = self.wire.lock().unwrap();
        let pending = wire
            .channels
            .get_mut(channel)
            .ok_or_else(|| RttError::transport("read channel", Some(channel)))?;
        let read = pending.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(pending.drain(..read)) {
            *slot = byte;
        }
        Ok(read)
    }

    async fn status(&mut self) -> Result<ProbeStatus> {
        let up_channels = self.wire.lock().unwrap().channels.len();
        Ok(ProbeStatus { running: true, up_channels, ..ProbeStatus::default() })
    }

    async fn flash(&mut self, _image: &Path) -> Result<()> {
        Ok(())
    }

    async fn reset_target(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects delivered records.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<(DateTime<Utc>, LogRecord)>>,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().iter().map(|(_, record)| record.clone()).collect()
    }
}

impl Sink for CollectingSink {
    fn deliver(&self, received_at: DateTime<Utc>, record: &LogRecord) {
        self.records.lock().unwrap().push((received_at, record.clone()));
    }
}

/// Fresh, empty directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rttlog-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
