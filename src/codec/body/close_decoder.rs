//! Decoder for response entities delimited by connection close.
//!
//! Octets accumulate until the peer closes; the driver then calls
//! [`CloseDecoder::finish`] (via `Decoder::decode_eof`) to take the entity.
//! The accumulator is bounded by the configured content-length limit.

use crate::ensure;
use crate::protocol::ParseError;
use bytes::{Bytes, BytesMut};

#[derive(Debug)]
pub(crate) struct CloseDecoder {
    buffer: BytesMut,
    limit: u64,
}

impl CloseDecoder {
    pub(crate) fn new(limit: u64) -> Self {
        Self { buffer: BytesMut::new(), limit }
    }

    pub(crate) fn decode(&mut self, src: &mut BytesMut) -> Result<(), ParseError> {
        let length = self.buffer.len() as u64 + src.len() as u64;
        ensure!(length <= self.limit, ParseError::BodyTooLarge { length, limit: self.limit });
        self.buffer.extend_from_slice(&src.split());
        Ok(())
    }

    pub(crate) fn finish(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }
}
