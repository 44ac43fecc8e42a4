//! Newline framing.
//!
//! Reads from sockets and pipes return whatever bytes happen to be
//! available, so a line can be split across reads or several lines can
//! arrive in one. [`LineFramer`] buffers the raw bytes and hands back
//! complete lines only.

use bytes::{Buf, BytesMut};

use crate::error::ProtocolError;

/// Default cap on a single line.
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    max_line_len: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        LineFramer {
            buffer: BytesMut::with_capacity(4096),
            max_line_len,
        }
    }

    /// The underlying buffer, for `AsyncReadExt::read_buf`.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Append a chunk exactly as it was read.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator (`\n` or `\r\n`).
    ///
    /// Returns `Ok(None)` when no full line is buffered yet. A line longer
    /// than the limit is dropped together with everything buffered.
    pub fn next_line(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let line = self.buffer.split_to(pos + 1);
                if pos > self.max_line_len {
                    return Err(ProtocolError::LineTooLong {
                        limit: self.max_line_len,
                    });
                }
                Ok(Some(decode(&line[..pos])))
            }
            None if self.buffer.len() > self.max_line_len => {
                self.buffer.clear();
                Err(ProtocolError::LineTooLong {
                    limit: self.max_line_len,
                })
            }
            None => Ok(None),
        }
    }

    /// Whatever is left once the stream has ended (an unterminated last line).
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = decode(&self.buffer);
        self.buffer.advance(self.buffer.len());
        Some(rest).filter(|line| !line.is_empty())
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
