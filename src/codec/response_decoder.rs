//! HTTP response decoder.
//!
//! The client-side counterpart of [`RequestDecoder`](super::RequestDecoder).
//! Responses add two framing modes requests never use: bodiless messages
//! selected by status code, and bodies delimited by connection close, which
//! finish in [`Decoder::decode_eof`] when used behind a
//! `tokio_util::codec::FramedRead`.

use crate::codec::body::{BodyDecoder, ChunkedItem};
use crate::codec::head::ResponseHeadDecoder;
use crate::protocol::{BodyFraming, MessageItem, ParseError, ParserSettings, ResponseHead};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio_util::codec::Decoder;

pub struct ResponseDecoder {
    settings: Arc<ParserSettings>,
    head: ResponseHeadDecoder,
    /// Head parked while a fixed-length or until-close body accumulates
    pending: Option<ResponseHead>,
    body: Option<BodyDecoder>,
    /// A terminal error state is sticky: once reached it is reported again
    /// on every further call
    error: Option<ParseError>,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self::with_settings(Arc::new(ParserSettings::default()))
    }

    pub fn with_settings(settings: Arc<ParserSettings>) -> Self {
        Self {
            head: ResponseHeadDecoder::new(settings.clone()),
            settings,
            pending: None,
            body: None,
            error: None,
        }
    }

    fn reset(&mut self) {
        self.head = ResponseHeadDecoder::new(self.settings.clone());
        self.pending = None;
        self.body = None;
    }

    fn fail(&mut self, error: ParseError) -> ParseError {
        self.error = Some(error.clone());
        error
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ResponseDecoder {
    type Item = MessageItem<ResponseHead>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        self.decode_next(src).map_err(|e| self.fail(e))
    }

    /// Completes until-close bodies when the peer closes the connection.
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

impl ResponseDecoder {
    fn decode_next(&mut self, src: &mut BytesMut) -> Result<Option<MessageItem<ResponseHead>>, ParseError> {
        loop {
            if let Some(body) = &mut self.body {
                return match body {
                    BodyDecoder::Length(decoder) => match decoder.decode(src)? {
                        Some(bytes) => {
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

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use http::{StatusCode, Version};
    use tokio_util::codec::FramedRead;

    fn drain(decoder: &mut ResponseDecoder, src: &mut BytesMut) -> Vec<MessageItem<ResponseHead>> {
        let mut parts = Vec::new();
        while let Some(part) = decoder.decode(src).unwrap() {
            parts.push(part);
        }
        parts
    }

    #[test]
    fn body_runs_to_connection_close_on_http_10() {
        let mut decoder = ResponseDecoder::new();
        let mut src = BytesMut::from(&b"HTTP/1.0 404 Not Found\r\nHost: api.example.com\r\n\r\nFoobs"[..]);

        assert!(decoder.decode(&mut src).unwrap().is_none());
        let part = decoder.decode_eof(&mut src).unwrap().unwrap();
        match part {
            MessageItem::Complete { head, body } => {
                assert_eq!(head.version(), Version::HTTP_10);
                assert_eq!(head.status(), StatusCode::NOT_FOUND);
                assert_eq!(&head.reason()[..], b"Not Found");
                assert_eq!(head.headers().get("host").unwrap(), "api.example.com");
                assert_eq!(&body[..], b"Foobs");
            }
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn chunked_response_start_then_first_chunk() {
        let mut decoder = ResponseDecoder::new();
        let mut src = BytesMut::from(
            &b"HTTP/1.1 200 OK\r\nUser-Agent: curl/7.19.7\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc"[..],
        );

        let parts = drain(&mut decoder, &mut src);
        assert_eq!(parts.len(), 2);
        match &parts[0] {
            MessageItem::ChunkedStart(head) => {
                assert_eq!(head.status(), StatusCode::OK);
                let names: Vec<&str> = head.headers().iter().map(|f| f.name().as_str()).collect();
                assert_eq!(names, vec!["user-agent", "transfer-encoding"]);
            }
            other => panic!("unexpected part {other:?}"),
        }
        match &parts[1] {
            MessageItem::Chunk(chunk) => assert_eq!(&chunk.data[..], b"abc"),
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn missing_framing_on_http_11_is_length_required() {
        let mut decoder = ResponseDecoder::new();
        let mut src = BytesMut::from(&b"HTTP/1.1 200 OK\r\n\r\n"[..]);
        let err = decoder.decode(&mut src).unwrap_err();
        assert_eq!(err.to_string(), "Content-Length header or chunked transfer encoding required");
        assert_eq!(err.status(), StatusCode::LENGTH_REQUIRED);
    }

    #[test]
    fn multi_line_folded_headers() {
        let mut decoder = ResponseDecoder::new();
        let mut src = BytesMut::from(
            &b"HTTP/1.0 200 OK\r\nUser-Agent: curl/7.19.7\r\n abc\r\n    xyz\r\nAccept\r\n : */*  \r\n\r\n"[..],
        );

        assert!(decoder.decode(&mut src).unwrap().is_none());
        let part = decoder.decode_eof(&mut src).unwrap().unwrap();
        let head = match part {
            MessageItem::Complete { head, .. } => head,
            other => panic!("unexpected part {other:?}"),
        };

        let pairs: Vec<(&str, &[u8])> =
            head.headers().iter().map(|f| (f.name().as_str(), f.value().as_bytes())).collect();
        assert_eq!(
            pairs,
            vec![("user-agent", &b"curl/7.19.7 abc xyz"[..]), ("accept", &b"*/*"[..])]
        );
    }

    #[test]
    fn content_length_zero_completes_with_empty_body() {
        let mut decoder = ResponseDecoder::new();
        let mut src = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"[..]);
        let parts = drain(&mut decoder, &mut src);
        assert_eq!(parts.len(), 1);
        match &parts[0] {
            MessageItem::Complete { body, .. } => assert!(body.is_empty()),
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn fixed_length_body_is_delivered_inline() {
        let mut decoder = ResponseDecoder::new();
        let mut src = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabcHTTP"[..]);
        let parts = drain(&mut decoder, &mut src);
        match &parts[0] {
            MessageItem::Complete { body, .. } => assert_eq!(&body[..], b"abc"),
            other => panic!("unexpected part {other:?}"),
        }
        // the next message's prefix stays in the buffer
        assert_eq!(&src[..], b"HTTP");
    }

    #[tokio::test]
    async fn framed_read_drives_an_until_close_body() {
        let (mut tx, rx) = tokio::io::duplex(256);
        let mut framed = FramedRead::new(rx, ResponseDecoder::new());

        use tokio::io::AsyncWriteExt;
        tx.write_all(b"HTTP/1.0 200 OK\r\n\r\nstreamed until close").await.unwrap();
        drop(tx);

        let part = framed.next().await.unwrap().unwrap();
        match part {
            MessageItem::Complete { head, body } => {
                assert_eq!(head.status(), StatusCode::OK);
                assert_eq!(&body[..], b"streamed until close");
            }
            other => panic!("unexpected part {other:?}"),
        }
        assert!(framed.next().await.is_none());
    }
}
