//! Wire decoder interface
//!
//! Frame decoding is owned by the firmware's serialization library. The channel reader
//! only needs "decode at most one frame from the front of this buffer", expressed by
//! [`WireDecoder`]. Closures with the right signature implement the trait, and
//! [`LineDecoder`] covers firmware that writes plain newline-terminated text.

use crate::catalog::Catalog;

/// Result of one decode attempt against an accumulated buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOutcome {
    /// Decoded text, if a complete frame was found.
    pub message: Option<String>,
    /// Malformed bytes skipped at the head of the buffer.
    pub corrupted: usize,
    /// Length of the unconsumed tail. Everything before it, corrupted bytes included,
    /// has been consumed.
    pub remaining: usize,
}

impl DecodeOutcome {
    /// Nothing decodable yet; keep all `len` bytes.
    pub fn incomplete(len: usize) -> Self {
        Self { message: None, corrupted: 0, remaining: len }
    }

    pub fn message(message: impl Into<String>, remaining: usize) -> Self {
        Self { message: Some(message.into()), corrupted: 0, remaining }
    }

    pub fn corrupted(corrupted: usize, remaining: usize) -> Self {
        Self { message: None, corrupted, remaining }
    }

    /// Bytes consumed from a buffer of `len` bytes.
    pub fn consumed(&self, len: usize) -> usize {
        len.saturating_sub(self.remaining)
    }
}

/// Decodes one frame from the head of a byte buffer.
pub trait WireDecoder: Send + Sync + 'static {
    fn decode(&self, buf: &[u8], catalog: &Catalog) -> DecodeOutcome;
}

impl<F> WireDecoder for F
where
    F: Fn(&[u8], &Catalog) -> DecodeOutcome + Send + Sync + 'static,
{
    fn decode(&self, buf: &[u8], catalog: &Catalog) -> DecodeOutcome {
        self(buf, catalog)
    }
}

/// Newline-terminated text frames; the catalog is not consulted.
///
/// A trailing `\r` is stripped and invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineDecoder;

impl WireDecoder for LineDecoder {
    fn decode(&self, buf: &[u8], _catalog: &Catalog) -> DecodeOutcome {
        let Some(end) = buf.iter().position(|&b| b == b'\n') else {
            return DecodeOutcome::incomplete(buf.len());
        };
        let line = &buf[..end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        DecodeOutcome::message(String::from_utf8_lossy(line), buf.len() - end - 1)
    }
}
