//! Line framing for the PSX protocol.
//!
//! Records are ASCII lines terminated by CRLF. Bare LF is accepted on
//! input; output always uses CRLF.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::types::PsxError;

/// Default upper bound for a single received line
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Codec turning a byte stream into protocol lines and back
#[derive(Debug, Clone)]
pub struct PsxLineCodec {
    max_line_length: usize,
    // bytes already scanned for a terminator, so partial lines are not rescanned
    next_index: usize,
}

impl PsxLineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }
}

impl Default for PsxLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn into_line(mut raw: BytesMut) -> String {
    if raw.last() == Some(&b'\r') {
        raw.truncate(raw.len() - 1);
    }
    String::from_utf8_lossy(&raw).into_owned()
}

impl Decoder for PsxLineCodec {
    type Item = String;
    type Error = PsxError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // one extra byte so a line of exactly max length can still find its LF
        let read_to = buf.len().min(self.max_line_length.saturating_add(2));

        match buf[self.next_index..read_to]
            .iter()
            .position(|b| *b == b'\n')
        {
            Some(offset) => {
                let newline = self.next_index + offset;
                self.next_index = 0;
                let mut raw = buf.split_to(newline + 1);
                raw.truncate(newline);
                let line = into_line(raw);
                if line.len() > self.max_line_length {
                    return Err(PsxError::LineTooLong {
                        limit: self.max_line_length,
                    });
                }
                Ok(Some(line))
            }
            None if buf.len() > self.max_line_length.saturating_add(1) => {
                Err(PsxError::LineTooLong {
                    limit: self.max_line_length,
                })
            }
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if buf.is_empty() {
            return Ok(None);
        }
        // final record without terminator
        let line = into_line(buf.split_to(buf.len()));
        if line.len() > self.max_line_length {
            return Err(PsxError::LineTooLong {
                limit: self.max_line_length,
            });
        }
        Ok(Some(line))
    }
}

impl Encoder<String> for PsxLineCodec {
    type Error = PsxError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
