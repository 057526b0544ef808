//! HTTP response encoder.
//!
//! Consumes outbound [`MessageItem`] parts and produces wire bytes: the
//! status line, headers with the framing header fixed up to match the part
//! sequence, then either the inline body or hex-sized chunks with their
//! extensions and trailers.

use crate::protocol::{MessageItem, ResponseHead, SendError};
use bytes::{BufMut, Bytes, BytesMut};
use http::Version;
use std::io::Write;
use tokio_util::codec::Encoder;
use tracing::error;

const INIT_HEAD_SIZE: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncodeState {
    /// Expecting a message start
    Head,
    /// Between ChunkedStart and ChunkedEnd
    Streaming,
}

pub struct ResponseEncoder {
    state: EncodeState,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { state: EncodeState::Head }
    }
}

impl Encoder<MessageItem<ResponseHead>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: MessageItem<ResponseHead>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            MessageItem::Complete { head, body } => {
                self.expect(EncodeState::Head, "complete response")?;
                encode_head(&head, Framing::Length(body.len()), dst)?;
                dst.extend_from_slice(&body);
                Ok(())
            }

            MessageItem::ChunkedStart(head) => {
                self.expect(EncodeState::Head, "chunked start")?;
                encode_head(&head, Framing::Chunked, dst)?;
                self.state = EncodeState::Streaming;
                Ok(())
            }

            MessageItem::Chunk(chunk) => {
                self.expect(EncodeState::Streaming, "chunk")?;
                write!(helper::Writer(dst), "{:X}", chunk.data.len())?;
                encode_extensions(&chunk.extensions, dst);
                dst.extend_from_slice(b"\r\n");
                dst.reserve(chunk.data.len() + 2);
                dst.extend_from_slice(&chunk.data);
                dst.extend_from_slice(b"\r\n");
                Ok(())
            }

            MessageItem::ChunkedEnd(end) => {
                self.expect(EncodeState::Streaming, "chunked end")?;
                dst.extend_from_slice(b"0");
                encode_extensions(&end.extensions, dst);
                dst.extend_from_slice(b"\r\n");
                for field in &end.trailer {
                    dst.extend_from_slice(field.name().as_ref());
                    dst.extend_from_slice(b": ");
                    dst.extend_from_slice(field.value().as_ref());
                    dst.extend_from_slice(b"\r\n");
                }
                dst.extend_from_slice(b"\r\n");
                self.state = EncodeState::Head;
                Ok(())
            }
        }
    }
}

impl ResponseEncoder {
    fn expect(&self, state: EncodeState, part: &'static str) -> Result<(), SendError> {
        if self.state != state {
            error!(state = ?self.state, part, "response part out of order");
            return Err(SendError::invalid_part(format!("unexpected {part}")));
        }
        Ok(())
    }
}

enum Framing {
    Length(usize),
    Chunked,
}

fn encode_head(head: &ResponseHead, framing: Framing, dst: &mut BytesMut) -> Result<(), SendError> {
    dst.reserve(INIT_HEAD_SIZE);

    match head.version() {
        Version::HTTP_11 => dst.put_slice(b"HTTP/1.1 "),
        Version::HTTP_10 => dst.put_slice(b"HTTP/1.0 "),
        v => {
            error!(http_version = ?v, "unsupported http version");
            return Err(SendError::invalid_part("unsupported http version"));
        }
    }

    dst.put_slice(head.status().as_str().as_bytes());
    dst.put_slice(b" ");
    if head.reason().is_empty() {
        dst.put_slice(head.status().canonical_reason().unwrap_or("Unknown").as_bytes());
    } else {
        dst.put_slice(head.reason());
    }
    dst.put_slice(b"\r\n");

    // the framing header is owned by the encoder so it always matches the
    // part sequence being written
    for field in head.headers() {
        let name = field.name().as_str();
        if name == "content-length" || name == "transfer-encoding" {
            continue;
        }
        dst.put_slice(name.as_bytes());
        dst.put_slice(b": ");
        dst.put_slice(field.value().as_ref());
        dst.put_slice(b"\r\n");
    }

    match framing {
        Framing::Length(n) => {
            write!(helper::Writer(dst), "content-length: {n}\r\n")?;
        }
        Framing::Chunked => dst.put_slice(b"transfer-encoding: chunked\r\n"),
    }

    dst.put_slice(b"\r\n");
    Ok(())
}

fn encode_extensions(extensions: &[crate::protocol::ChunkExtension], dst: &mut BytesMut) {
    for ext in extensions {
        dst.extend_from_slice(b";");
        dst.extend_from_slice(&ext.name);
        if let Some(value) = &ext.value {
            dst.extend_from_slice(b"=");
            if value.iter().all(|&b| crate::codec::chars::is_token_char(b)) && !value.is_empty() {
                dst.extend_from_slice(value);
            } else {
                encode_quoted(value, dst);
            }
        }
    }
}

fn encode_quoted(value: &Bytes, dst: &mut BytesMut) {
    dst.extend_from_slice(b"\"");
    for &b in value.iter() {
        if b == b'"' || b == b'\\' {
            dst.extend_from_slice(b"\\");
        }
        dst.extend_from_slice(&[b]);
    }
    dst.extend_from_slice(b"\"");
}

mod helper {
    use bytes::{BufMut, BytesMut};
    use std::io;

    pub struct Writer<'a>(pub &'a mut BytesMut);

    impl io::Write for Writer<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.put_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Chunk, ChunkExtension, ChunkedEnd, FieldList};
    use http::StatusCode;

    #[test]
    fn complete_response_with_body() {
        let mut head = ResponseHead::new(StatusCode::OK);
        head.push_header("content-type".parse().unwrap(), "text/plain".parse().unwrap());

        let mut dst = BytesMut::new();
        ResponseEncoder::new()
            .encode(MessageItem::Complete { head, body: Bytes::from_static(b"hello") }, &mut dst)
            .unwrap();

        assert_eq!(
            &dst[..],
            &b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 5\r\n\r\nhello"[..]
        );
    }

    #[test]
    fn head_only_response_has_zero_content_length() {
        let mut dst = BytesMut::new();
        ResponseEncoder::new()
            .encode(
                MessageItem::Complete { head: ResponseHead::new(StatusCode::NOT_FOUND), body: Bytes::new() },
                &mut dst,
            )
            .unwrap();
        assert_eq!(&dst[..], &b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n"[..]);
    }

    #[test]
    fn chunked_stream_round() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(MessageItem::ChunkedStart(ResponseHead::new(StatusCode::OK)), &mut dst).unwrap();
        encoder.encode(MessageItem::Chunk(Chunk::new(Bytes::from_static(b"abc"))), &mut dst).unwrap();
        encoder
            .encode(
                MessageItem::ChunkedEnd(ChunkedEnd { extensions: Vec::new(), trailer: FieldList::new() }),
                &mut dst,
            )
            .unwrap();

        assert_eq!(
            &dst[..],
            &b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n"[..]
        );
    }

    #[test]
    fn chunk_extensions_are_rendered() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();
        encoder.encode(MessageItem::ChunkedStart(ResponseHead::new(StatusCode::OK)), &mut dst).unwrap();
        dst.clear();

        let chunk = Chunk {
            data: Bytes::from_static(b"x"),
            extensions: vec![
                ChunkExtension { name: Bytes::from_static(b"bare"), value: None },
                ChunkExtension { name: Bytes::from_static(b"note"), value: Some(Bytes::from_static(b"two words")) },
            ],
        };
        encoder.encode(MessageItem::Chunk(chunk), &mut dst).unwrap();
        assert_eq!(&dst[..], &b"1;bare;note=\"two words\"\r\nx\r\n"[..]);
    }

    #[test]
    fn rendered_responses_parse_back_unchanged() {
        use crate::codec::ResponseDecoder;
        use tokio_util::codec::Decoder;

        let mut head = ResponseHead::new(StatusCode::CREATED);
        head.push_header("content-type".parse().unwrap(), "text/plain".parse().unwrap());
        head.push_header("x-request-id".parse().unwrap(), "42".parse().unwrap());
        let body = Bytes::from_static(b"created");

        let mut wire = BytesMut::new();
        ResponseEncoder::new()
            .encode(MessageItem::Complete { head: head.clone(), body: body.clone() }, &mut wire)
            .unwrap();

        let mut decoder = ResponseDecoder::new();
        let parsed = decoder.decode(&mut wire).unwrap().unwrap();
        match parsed {
            MessageItem::Complete { head: parsed_head, body: parsed_body } => {
                assert_eq!(parsed_head.status(), StatusCode::CREATED);
                assert_eq!(parsed_body, body);
                assert_eq!(parsed_head.headers().get("content-type").unwrap(), "text/plain");
                assert_eq!(parsed_head.headers().get("x-request-id").unwrap(), "42");
                assert_eq!(parsed_head.headers().get("content-length").unwrap(), "7");
            }
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn out_of_order_parts_are_rejected() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();
        let result = encoder.encode(MessageItem::Chunk(Chunk::new(Bytes::from_static(b"x"))), &mut dst);
        assert!(result.is_err());
    }

    #[test]
    fn existing_framing_headers_are_replaced() {
        let mut head = ResponseHead::new(StatusCode::OK);
        head.push_header("content-length".parse().unwrap(), "999".parse().unwrap());

        let mut dst = BytesMut::new();
        ResponseEncoder::new()
            .encode(MessageItem::Complete { head, body: Bytes::from_static(b"ok") }, &mut dst)
            .unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.contains("content-length: 2\r\n"));
        assert!(!text.contains("999"));
    }
}
