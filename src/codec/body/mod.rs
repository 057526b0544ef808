//! Body decoders for the three framing modes.

mod chunked_decoder;
mod close_decoder;
mod length_decoder;

pub(crate) use chunked_decoder::{ChunkedDecoder, ChunkedItem};
pub(crate) use close_decoder::CloseDecoder;
pub(crate) use length_decoder::LengthDecoder;

use crate::protocol::{BodyFraming, ParserSettings};
use std::sync::Arc;

/// The decoding strategy selected by the framing decision.
pub(crate) enum BodyDecoder {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    UntilClose(CloseDecoder),
}

impl BodyDecoder {
    /// Picks the decoder for a framing decision; `None` for empty bodies.
    pub(crate) fn for_framing(framing: BodyFraming, settings: &Arc<ParserSettings>) -> Option<Self> {
        match framing {
            BodyFraming::Empty => None,
            BodyFraming::Length(n) => Some(Self::Length(LengthDecoder::new(n))),
            BodyFraming::Chunked => Some(Self::Chunked(ChunkedDecoder::new(settings.clone()))),
            BodyFraming::UntilClose => Some(Self::UntilClose(CloseDecoder::new(settings.max_content_length))),
        }
    }
}
