//! Per-channel byte readers
//!
//! A [`ChannelReader`] owns the accumulation buffer of one RTT up-channel. Each poll reads
//! once from the probe, decodes as many frames as the buffer holds and turns them into
//! [`LogRecord`]s. Corrupted bytes are reported and dropped by the decoder; bytes the
//! decoder can neither decode nor reject are evicted one at a time once the channel has
//! been quiet for the stall timeout.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::Result;
use crate::catalog::Catalog;
use crate::config::TimingConfig;
use crate::decoder::WireDecoder;
use crate::parser::parse_record;
use crate::probe::ProbeSession;
use crate::sink::Sink;
use crate::types::LogRecord;

/// Reader state for one up-channel. Rebuilt for every probe session.
#[derive(Debug)]
pub struct ChannelReader {
    index: usize,
    buffer: Vec<u8>,
    last_valid: Instant,
    stall_timeout: Duration,
    read_chunk: usize,
}

impl ChannelReader {
    pub fn new(index: usize, timing: &TimingConfig) -> Self {
        Self {
            index,
            buffer: Vec::new(),
            last_valid: Instant::now(),
            stall_timeout: timing.stall_timeout(),
            read_chunk: timing.read_chunk.max(1),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Bytes waiting to be decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Read once from the probe and decode everything that is complete.
    ///
    /// Returns whether at least one record was produced.
    pub async fn poll<S>(
        &mut self,
        session: &mut S,
        decoder: &dyn WireDecoder,
        catalog: &Catalog,
        notifier: &dyn Sink,
        out: &mut Vec<LogRecord>,
    ) -> Result<bool>
    where
        S: ProbeSession + ?Sized,
    {
        let old_len = self.buffer.len();
        self.buffer.resize(old_len + self.read_chunk, 0);
        let read = session.read_channel(self.index, &mut self.buffer[old_len..]).await;
        let read = match read {
            Ok(read) => read.min(self.read_chunk),
            Err(e) => {
                self.buffer.truncate(old_len);
                return Err(e);
            }
        };
        self.buffer.truncate(old_len + read);
        if read > 0 {
            trace!(channel = self.index, read, buffered = self.buffer.len(), "Read channel");
        }
        Ok(self.drain(decoder, catalog, notifier, out))
    }

    /// Append raw bytes without touching the probe.
    pub fn ingest(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Decode buffered frames, then apply stall recovery.
    pub fn drain(
        &mut self,
        decoder: &dyn WireDecoder,
        catalog: &Catalog,
        notifier: &dyn Sink,
        out: &mut Vec<LogRecord>,
    ) -> bool {
        let mut produced = false;

        while !self.buffer.is_empty() {
            let len = self.buffer.len();
            let outcome = decoder.decode(&self.buffer, catalog);
            let consumed = outcome.consumed(len);
            self.buffer.drain(..consumed);

            if outcome.corrupted > 0 {
                let plural = if outcome.corrupted == 1 { "" } else { "s" };
                let message = format!(
                    "channel {} corrupted data removed {} byte{plural}",
                    self.index, outcome.corrupted
                );
                warn!(channel = self.index, bytes = outcome.corrupted, "Corrupted data removed");
                notifier.error_message(&message);
            }

            match outcome.message {
                Some(text) => {
                    self.last_valid = Instant::now();
                    out.push(parse_record(self.index, &text));
                    produced = true;
                }
                None if outcome.corrupted == 0 => break,
                None => {}
            }

            if consumed == 0 {
                break;
            }
        }

        let now = Instant::now();
        if self.buffer.is_empty() {
            self.last_valid = now;
        } else if now.duration_since(self.last_valid) > self.stall_timeout {
            self.buffer.remove(0);
            self.last_valid = now;
            warn!(channel = self.index, buffered = self.buffer.len(), "Channel stalled, removed 1 byte");
            notifier.error_message(&format!("channel {} timeout removed 1 byte", self.index));
        }

        produced
    }
}
