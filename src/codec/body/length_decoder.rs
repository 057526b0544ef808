//! Decoder for entities delimited by Content-Length.
//!
//! The whole entity is accumulated and handed back in one piece, so the
//! emitted part sequence does not depend on how the input was fragmented.
//! The length was checked against the configured limit when the framing
//! decision was made.

use crate::protocol::ParseError;
use bytes::{Bytes, BytesMut};
use std::cmp;

#[derive(Debug)]
pub(crate) struct LengthDecoder {
    remaining: u64,
    buffer: BytesMut,
}

impl LengthDecoder {
    pub(crate) fn new(length: u64) -> Self {
        Self { remaining: length, buffer: BytesMut::new() }
    }

    /// Consumes up to `remaining` octets; returns the full entity once the
    /// last octet arrived.
    pub(crate) fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, ParseError> {
        if self.remaining > 0 {
            if src.is_empty() {
                return Ok(None);
            }
            let take = cmp::min(self.remaining, src.len() as u64) as usize;
            self.buffer.extend_from_slice(&src.split_to(take));
            self.remaining -= take as u64;
        }

        if self.remaining == 0 {
            Ok(Some(self.buffer.split().freeze()))
        } else {
            Ok(None)
        }
    }
}
