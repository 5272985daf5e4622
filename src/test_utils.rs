//! Test doubles for the probe, the wire decoder and sinks
//!
//! Shared by the unit tests and the benchmarks. [`MockProbe`] drives scripted sessions,
//! [`SyncFrameDecoder`] understands the toy framing produced by [`encode_frame`], and
//! [`RecordingSink`] captures everything delivered to it.

#![cfg(any(test, feature = "benchmark"))]

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::catalog::Catalog;
use crate::config::ProbeTarget;
use crate::decoder::{DecodeOutcome, WireDecoder};
use crate::probe::{Probe, ProbeSession};
use crate::sink::Sink;
use crate::types::{LogRecord, ProbeStatus};
use crate::{Result, RttError};

/// First byte of every frame written by [`encode_frame`].
pub const SYNC: u8 = 0xA5;

/// `[SYNC, id_lo, id_hi, len, payload..]`. Payloads longer than 255 bytes are truncated.
pub fn encode_frame(id: u16, payload: &[u8]) -> Vec<u8> {
    let payload = &payload[..payload.len().min(usize::from(u8::MAX))];
    let [lo, hi] = id.to_le_bytes();
    let mut frame = vec![SYNC, lo, hi, payload.len() as u8];
    frame.extend_from_slice(payload);
    frame
}

/// Catalog understood by [`SyncFrameDecoder`] in tests: id 1 is the bare payload, id 2
/// appends `!`.
pub fn test_catalog() -> Catalog {
    [(1, "{}".to_string()), (2, "{}!".to_string())].into_iter().collect()
}

/// Decoder for [`encode_frame`] output.
///
/// Bytes before a sync byte are reported as corrupted, as is the sync byte of a frame
/// whose id is missing from the catalog. The decoded text is the template with its first
/// `{}` replaced by the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncFrameDecoder;

impl WireDecoder for SyncFrameDecoder {
    fn decode(&self, buf: &[u8], catalog: &Catalog) -> DecodeOutcome {
        let len = buf.len();
        if buf.first().is_some_and(|&b| b != SYNC) {
            let skip = buf.iter().position(|&b| b == SYNC).unwrap_or(len);
            return DecodeOutcome::corrupted(skip, len - skip);
        }
        if len < 4 {
            return DecodeOutcome::incomplete(len);
        }
        let id = u16::from_le_bytes([buf[1], buf[2]]);
        let Some(template) = catalog.get(id) else {
            return DecodeOutcome::corrupted(1, len - 1);
        };
        let end = 4 + usize::from(buf[3]);
        if len < end {
            return DecodeOutcome::incomplete(len);
        }
        let payload = String::from_utf8_lossy(&buf[4..end]);
        DecodeOutcome::message(template.replacen("{}", &payload, 1), len - end)
    }
}

/// Something the mock probe was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    Opened,
    TransportStarted { channels: usize, address: u32 },
    Flashed(PathBuf),
    TargetReset,
    Closed,
}

#[derive(Debug)]
struct Script {
    pending: Vec<VecDeque<Vec<u8>>>,
    running: bool,
    halted: bool,
    up_channels: usize,
    bytes_read: u64,
    open_failures: usize,
    read_failures: usize,
    flash_failures: usize,
    events: Vec<ProbeEvent>,
}

/// Scripted probe. Clones share one script, so a test keeps a handle while the
/// connection manager owns another.
#[derive(Debug, Clone)]
pub struct MockProbe {
    script: Arc<Mutex<Script>>,
}

impl MockProbe {
    /// A running probe whose firmware exposes `channels` up-channels.
    pub fn new(channels: usize) -> Self {
        let script = Script {
            pending: vec![VecDeque::new(); channels],
            running: true,
            halted: false,
            up_channels: channels,
            bytes_read: 0,
            open_failures: 0,
            read_failures: 0,
            flash_failures: 0,
            events: Vec::new(),
        };
        Self { script: Arc::new(Mutex::new(script)) }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        lock(&self.script)
    }

    /// Queue bytes returned by a later read of `channel`.
    pub fn push_bytes(&self, channel: usize, bytes: &[u8]) {
        if let Some(queue) = self.script().pending.get_mut(channel) {
            queue.push_back(bytes.to_vec());
        }
    }

    pub fn push_frame(&self, channel: usize, id: u16, payload: &str) {
        self.push_bytes(channel, &encode_frame(id, payload.as_bytes()));
    }

    pub fn fail_opens(&self, count: usize) {
        self.script().open_failures = count;
    }

    pub fn fail_reads(&self, count: usize) {
        self.script().read_failures = count;
    }

    pub fn fail_flashes(&self, count: usize) {
        self.script().flash_failures = count;
    }

    pub fn set_running(&self, running: bool) {
        self.script().running = running;
    }

    pub fn set_halted(&self, halted: bool) {
        self.script().halted = halted;
    }

    pub fn set_up_channels(&self, channels: usize) {
        self.script().up_channels = channels;
    }

    pub fn events(&self) -> Vec<ProbeEvent> {
        self.script().events.clone()
    }

    pub fn opens(&self) -> usize {
        self.script().events.iter().filter(|e| **e == ProbeEvent::Opened).count()
    }

    /// A session that bypasses [`Probe::open`].
    pub fn session(&self) -> MockSession {
        MockSession { script: self.script.clone() }
    }
}

#[async_trait::async_trait]
impl Probe for MockProbe {
    type Session = MockSession;

    async fn open(&self, _target: &ProbeTarget) -> Result<MockSession> {
        let mut script = self.script();
        if script.open_failures > 0 {
            script.open_failures -= 1;
            return Err(RttError::connection_failed("no probe attached"));
        }
        script.events.push(ProbeEvent::Opened);
        Ok(self.session())
    }
}

/// Session handed out by [`MockProbe`]. Records [`ProbeEvent::Closed`] when dropped.
#[derive(Debug)]
pub struct MockSession {
    script: Arc<Mutex<Script>>,
}

#[async_trait::async_trait]
impl ProbeSession for MockSession {
    async fn start_transport(&mut self, channels: usize, address: u32) -> Result<()> {
        lock(&self.script).events.push(ProbeEvent::TransportStarted { channels, address });
        Ok(())
    }

    async fn read_channel(&mut self, channel: usize, buf: &mut [u8]) -> Result<usize> {
        let mut script = lock(&self.script);
        if script.read_failures > 0 {
            script.read_failures -= 1;
            return Err(RttError::transport("read channel", Some(channel)));
        }
        let queue = script
            .pending
            .get_mut(channel)
            .ok_or_else(|| RttError::transport("read channel", Some(channel)))?;
        let Some(mut chunk) = queue.pop_front() else {
            return Ok(0);
        };
        let read = chunk.len().min(buf.len());
        buf[..read].copy_from_slice(&chunk[..read]);
        if read < chunk.len() {
            queue.push_front(chunk.split_off(read));
        }
        script.bytes_read += read as u64;
        Ok(read)
    }

    async fn status(&mut self) -> Result<ProbeStatus> {
        let script = lock(&self.script);
        Ok(ProbeStatus {
            running: script.running,
            bytes_read: script.bytes_read,
            overflow_count: 0,
            up_channels: script.up_channels,
            down_channels: 0,
        })
    }

    async fn is_halted(&mut self) -> Result<bool> {
        Ok(lock(&self.script).halted)
    }

    async fn flash(&mut self, image: &Path) -> Result<()> {
        let mut script = lock(&self.script);
        if script.flash_failures > 0 {
            script.flash_failures -= 1;
            return Err(RttError::transport("flash", None));
        }
        script.events.push(ProbeEvent::Flashed(image.to_path_buf()));
        Ok(())
    }

    async fn reset_target(&mut self) -> Result<()> {
        lock(&self.script).events.push(ProbeEvent::TargetReset);
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        lock(&self.script).events.push(ProbeEvent::Closed);
    }
}

/// Captures deliveries and notifications.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(DateTime<Utc>, LogRecord)>>,
    statuses: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    fatals: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<(DateTime<Utc>, LogRecord)> {
        lock(&self.records).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.records).iter().map(|(_, record)| record.message.clone()).collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        lock(&self.statuses).clone()
    }

    pub fn errors(&self) -> Vec<String> {
        lock(&self.errors).clone()
    }

    pub fn fatals(&self) -> Vec<String> {
        lock(&self.fatals).clone()
    }
}

impl Sink for RecordingSink {
    fn deliver(&self, received_at: DateTime<Utc>, record: &LogRecord) {
        lock(&self.records).push((received_at, record.clone()));
    }

    fn status_message(&self, message: &str) {
        lock(&self.statuses).push(message.to_string());
    }

    fn error_message(&self, message: &str) {
        lock(&self.errors).push(message.to_string());
    }

    fn fatal_error(&self, message: &str) {
        lock(&self.fatals).push(message.to_string());
    }

    fn name(&self) -> &str {
        "recording"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_reads_back_encoded_frames() {
        let mut buf = encode_frame(2, b"ok");
        buf.extend(encode_frame(1, b"next"));
        let outcome = SyncFrameDecoder.decode(&buf, &test_catalog());
        assert_eq!(outcome, DecodeOutcome::message("ok!", 8));
    }

    #[test]
    fn decoder_skips_to_the_next_sync_byte() {
        let outcome = SyncFrameDecoder.decode(&[1, 2, SYNC, 0], &test_catalog());
        assert_eq!(outcome, DecodeOutcome::corrupted(2, 2));
    }

    #[tokio::test]
    async fn session_splits_large_chunks() {
        let probe = MockProbe::new(1);
        probe.push_bytes(0, b"abcdef");
        let mut session = probe.session();
        let mut buf = [0u8; 4];
        assert_eq!(session.read_channel(0, &mut buf).await.unwrap(), 4);
        assert_eq!(session.read_channel(0, &mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(session.status().await.unwrap().bytes_read, 6);
    }
}
