//! HTTP request decoder.
//!
//! Coordinates the head state machine and the body decoder selected by the
//! framing decision. The decoder operates in two phases, tracked by the
//! `body` field: `None` while the head is being parsed, `Some(_)` while a
//! body is being read. After a terminal part it resets itself, so one
//! decoder instance serves a whole connection while each message still gets
//! a fresh parser state.
//!
//! # Example
//!
//! ```no_run
//! use cascade_http::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::new();
//! // ... add request data to buffer ...
//! let part = decoder.decode(&mut buffer);
//! ```

use crate::codec::body::{BodyDecoder, ChunkedItem};
use crate::codec::head::RequestHeadDecoder;
use crate::protocol::{BodyFraming, MessageItem, ParseError, ParserSettings, RequestHead};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio_util::codec::Decoder;

pub struct RequestDecoder {
    settings: Arc<ParserSettings>,
    head: RequestHeadDecoder,
    /// Head parked while a fixed-length body accumulates
    pending: Option<RequestHead>,
    body: Option<BodyDecoder>,
    /// A terminal error state is sticky: once reached it is reported again
    /// on every further call
    error: Option<ParseError>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::with_settings(Arc::new(ParserSettings::default()))
    }

    pub fn with_settings(settings: Arc<ParserSettings>) -> Self {
        Self {
            head: RequestHeadDecoder::new(settings.clone()),
            settings,
            pending: None,
            body: None,
            error: None,
        }
    }

    /// Installs a fresh parser for the next message on the connection.
    fn reset(&mut self) {
        self.head = RequestHeadDecoder::new(self.settings.clone());
        self.pending = None;
        self.body = None;
    }

    fn fail(&mut self, error: ParseError) -> ParseError {
        self.error = Some(error.clone());
        error
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RequestDecoder {
    type Item = MessageItem<RequestHead>;
    type Error = ParseError;

    /// Attempts to decode the next message part from the buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(_))`: one progressive part; call again for the next
    /// - `Ok(None)`: need more data
    /// - `Err(_)`: a terminal parse error
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        self.decode_next(src).map_err(|e| self.fail(e))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }

        match &mut self.body {
            Some(BodyDecoder::UntilClose(decoder)) => {
                let body = decoder.finish();
                let head = self.pending.take().unwrap();
                self.reset();
                Ok(Some(MessageItem::Complete { head, body }))
            }
            Some(_) => Err(self.fail(ParseError::TruncatedMessage)),
            None if self.head.is_idle() => Ok(None),
            None => Err(self.fail(ParseError::TruncatedMessage)),
        }
    }
}

impl RequestDecoder {
    fn decode_next(&mut self, src: &mut BytesMut) -> Result<Option<MessageItem<RequestHead>>, ParseError> {
        loop {
            if let Some(body) = &mut self.body {
                return match body {
                    BodyDecoder::Length(decoder) => match decoder.decode(src)? {
                        Some(bytes) => {
                            // a head is always parked before a fixed-length
                            // body decoder is installed
                            let head = self.pending.take().unwrap();
                            self.reset();
                            Ok(Some(MessageItem::Complete { head, body: bytes }))
                        }
                        None => Ok(None),
                    },
                    BodyDecoder::Chunked(decoder) => match decoder.decode(src)? {
                        Some(ChunkedItem::Chunk(chunk)) => Ok(Some(MessageItem::Chunk(chunk))),
                        Some(ChunkedItem::End(end)) => {
                            self.reset();
                            Ok(Some(MessageItem::ChunkedEnd(end)))
                        }
                        None => Ok(None),
                    },
                    BodyDecoder::UntilClose(decoder) => {
                        decoder.decode(src)?;
                        Ok(None)
                    }
                };
            }

            match self.head.decode(src)? {
                Some((head, framing)) => {
                    self.body = BodyDecoder::for_framing(framing, &self.settings);
                    match framing {
                        BodyFraming::Empty => {
                            self.reset();
                            return Ok(Some(MessageItem::Complete { head, body: Bytes::new() }));
                        }
                        BodyFraming::Chunked => return Ok(Some(MessageItem::ChunkedStart(head))),
                        BodyFraming::Length(_) | BodyFraming::UntilClose => self.pending = Some(head),
                    }
                }
                None => return Ok(None),
            }
        }
    }

}
