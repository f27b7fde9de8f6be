//! Line Decoder
//!
//! Splits an arbitrarily chunked byte stream into complete lines. Bytes are
//! buffered raw, so a multi-byte UTF-8 character split across two reads is
//! reassembled before decoding.

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Maximum bytes a single unterminated line may occupy (1 MB)
///
/// A peer that never sends a newline would otherwise grow the buffer without
/// bound. When exceeded the partial line is dropped.
pub const MAX_LINE_SIZE: usize = 1024 * 1024;

/// Decoder state machine for newline-delimited input
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
    /// Lines discarded for exceeding [`MAX_LINE_SIZE`]
    oversized: u64,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    /// Create a new decoder with default buffer capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
            oversized: 0,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);

        if self.available() > MAX_LINE_SIZE && !self.pending().contains(&b'\n') {
            tracing::warn!(bytes = self.available(), "Dropping oversized partial line");
            self.oversized += 1;
            self.buffer.clear();
            self.read_pos = 0;
        }
    }

    /// Bytes buffered but not yet returned as a line
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Number of oversized partial lines dropped so far
    #[must_use]
    pub fn oversized_lines(&self) -> u64 {
        self.oversized
    }

    fn pending(&self) -> &[u8] {
        &self.buffer[self.read_pos..]
    }

    /// Next complete line, without its `\n` or `\r\n` terminator
    ///
    /// Returns `None` when only a partial line (or nothing) is buffered.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.pending().iter().position(|&b| b == b'\n')?;
        let mut line = &self.buffer[self.read_pos..self.read_pos + newline];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        let text = String::from_utf8_lossy(line).into_owned();
        self.read_pos += newline + 1;
        Some(text)
    }

    /// Take whatever partial line remains, for use at end of stream
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.available() == 0 {
            return None;
        }
        let mut rest = self.pending();
        if let Some(stripped) = rest.strip_suffix(b"\r") {
            rest = stripped;
        }
        let text = String::from_utf8_lossy(rest).into_owned();
        self.buffer.clear();
        self.read_pos = 0;
        Some(text)
    }
}
