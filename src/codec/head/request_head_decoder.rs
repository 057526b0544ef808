//! State machine for the request line, followed by the header block and the
//! framing decision.
//!
//! The request-target is treated as an opaque octet string: anything except
//! SP, CR and LF is accepted up to the configured limit, and no normalization
//! is applied.

use crate::codec::chars::is_token_char;
use crate::codec::head::header_section::HeaderSectionDecoder;
use crate::ensure;
use crate::protocol::{BodyFraming, FieldList, ParseError, ParserSettings, RequestHead};
use bytes::{Buf, BytesMut};
use http::{Method, Version};
use std::sync::Arc;

const VERSION_PREFIX: &[u8] = b"HTTP/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    Method,
    Target,
    VersionPrefix(usize),
    VersionMajor,
    VersionDot,
    VersionMinor,
    LineEnd,
    Headers,
}

pub(crate) struct RequestHeadDecoder {
    settings: Arc<ParserSettings>,
    state: LineState,
    method: BytesMut,
    target: BytesMut,
    major: u8,
    version: Version,
    section: HeaderSectionDecoder,
}

impl RequestHeadDecoder {
    pub(crate) fn new(settings: Arc<ParserSettings>) -> Self {
        Self {
            section: HeaderSectionDecoder::new(settings.clone()),
            settings,
            state: LineState::Method,
            method: BytesMut::new(),
            target: BytesMut::new(),
            major: 0,
            version: Version::HTTP_11,
        }
    }

    /// True while no octet of the current message has been consumed.
    pub(crate) fn is_idle(&self) -> bool {
        self.state == LineState::Method && self.method.is_empty()
    }

    pub(crate) fn decode(&mut self, src: &mut BytesMut) -> Result<Option<(RequestHead, BodyFraming)>, ParseError> {
        loop {
            if self.state == LineState::Headers {
                return match self.section.decode(src)? {
                    Some(fields) => self.finish(fields).map(Some),
                    None => Ok(None),
                };
            }

            if src.is_empty() {
                return Ok(None);
            }
            self.step(src.get_u8())?;
        }
    }

    fn step(&mut self, b: u8) -> Result<(), ParseError> {
        match self.state {
            LineState::Method => match b {
                c if is_token_char(c) => self.method.extend_from_slice(&[c]),
                b' ' if !self.method.is_empty() => self.state = LineState::Target,
                c => return Err(ParseError::invalid_character(c, "TOKEN CHAR or SP")),
            },

            LineState::Target => match b {
                b' ' if !self.target.is_empty() => self.state = LineState::VersionPrefix(0),
                b' ' | b'\r' | b'\n' => return Err(ParseError::invalid_character(b, "URI CHAR")),
                c => {
                    ensure!(
                        self.target.len() < self.settings.max_uri_length,
                        ParseError::UriTooLong { limit: self.settings.max_uri_length }
                    );
                    self.target.extend_from_slice(&[c]);
                }
            },

            LineState::VersionPrefix(index) => {
                ensure!(b == VERSION_PREFIX[index], ParseError::invalid_character(b, "HTTP/1.0 or HTTP/1.1"));
                self.state = if index + 1 < VERSION_PREFIX.len() {
                    LineState::VersionPrefix(index + 1)
                } else {
                    LineState::VersionMajor
                };
            }

            LineState::VersionMajor => match b {
                c if c.is_ascii_digit() => {
                    self.major = c - b'0';
                    self.state = LineState::VersionDot;
                }
                c => return Err(ParseError::invalid_character(c, "DIGIT")),
            },

            LineState::VersionDot => match b {
                b'.' => self.state = LineState::VersionMinor,
                c => return Err(ParseError::invalid_character(c, "'.'")),
            },

            LineState::VersionMinor => match b {
                c if c.is_ascii_digit() => {
                    self.version = match (self.major, c - b'0') {
                        (1, 0) => Version::HTTP_10,
                        (1, 1) => Version::HTTP_11,
                        _ => return Err(ParseError::UnsupportedVersion),
                    };
                    self.state = LineState::LineEnd;
                }
                c => return Err(ParseError::invalid_character(c, "DIGIT")),
            },

            LineState::LineEnd => match b {
                b'\r' => {}
                b'\n' => self.state = LineState::Headers,
                c => return Err(ParseError::invalid_character(c, "CR or LF")),
            },

            LineState::Headers => unreachable!("header block is consumed in decode"),
        }

        Ok(())
    }

    fn finish(&mut self, fields: FieldList) -> Result<(RequestHead, BodyFraming), ParseError> {
        let framing = request_framing(&fields, self.version, &self.settings)?;

        // the accumulator only ever holds token chars, always a valid method
        let method = Method::from_bytes(&self.method).unwrap();
        let head = RequestHead::new(method, self.target.split().freeze(), self.version, fields);

        Ok((head, framing))
    }
}

/// The §framing decision for requests: chunked beats content-length, absence
/// of framing headers means a zero-length body.
fn request_framing(
    fields: &FieldList,
    version: Version,
    settings: &ParserSettings,
) -> Result<BodyFraming, ParseError> {
    let host_count = fields.count("host");
    ensure!(host_count <= 1, ParseError::DuplicateHeader { name: "Host" });
    if version == Version::HTTP_11 {
        ensure!(host_count == 1, ParseError::MissingHost);
    }

    ensure!(fields.count("content-length") <= 1, ParseError::DuplicateHeader { name: "Content-Length" });

    if let Some(te) = fields.get("transfer-encoding") {
        if !final_coding_is_identity(te.as_bytes()) {
            return Ok(BodyFraming::Chunked);
        }
    }

    if let Some(cl) = fields.get("content-length") {
        let length = parse_content_length(cl.as_bytes())?;
        return if length == 0 {
            Ok(BodyFraming::Empty)
        } else {
            ensure!(
                length <= settings.max_content_length,
                ParseError::BodyTooLarge { length, limit: settings.max_content_length }
            );
            Ok(BodyFraming::Length(length))
        };
    }

    // request bodies are permitted unconditionally; no framing header means
    // a zero-length body
    Ok(BodyFraming::Empty)
}

/// True when the final coding of a Transfer-Encoding list is `identity`.
pub(crate) fn final_coding_is_identity(value: &[u8]) -> bool {
    let last = value.rsplit(|&b| b == b',').next().unwrap_or(value);
    trim_ascii(last).eq_ignore_ascii_case(b"identity")
}

/// Parses a Content-Length value: a decimal non-negative integer with
/// leading/trailing whitespace tolerated.
pub(crate) fn parse_content_length(value: &[u8]) -> Result<u64, ParseError> {
    let digits = trim_ascii(value);
    ensure!(!digits.is_empty(), ParseError::invalid_content_length(value));

    let mut length: u64 = 0;
    for &b in digits {
        ensure!(b.is_ascii_digit(), ParseError::invalid_content_length(value));
        length = length
            .checked_mul(10)
            .and_then(|n| n.checked_add((b - b'0') as u64))
            .ok_or_else(|| ParseError::invalid_content_length(value))?;
    }
    Ok(length)
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = bytes {
        bytes = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = bytes {
        bytes = rest;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Result<Option<(RequestHead, BodyFraming)>, ParseError> {
        let mut decoder = RequestHeadDecoder::new(Arc::new(ParserSettings::default()));
        let mut src = BytesMut::from(input);
        decoder.decode(&mut src)
    }

    #[test]
    fn simple_get() {
        let (head, framing) = decode(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n").unwrap().unwrap();
        assert_eq!(head.method(), &Method::GET);
        assert_eq!(&head.target()[..], b"/");
        assert_eq!(head.version(), Version::HTTP_11);
        assert_eq!(head.headers().len(), 1);
        assert_eq!(head.headers().get("host").unwrap(), "a");
        assert_eq!(framing, BodyFraming::Empty);
    }

    #[test]
    fn extension_method_token() {
        let (head, _) = decode(b"PURGE /cache HTTP/1.1\r\nHost: a\r\n\r\n").unwrap().unwrap();
        assert_eq!(head.method().as_str(), "PURGE");
    }

    #[test]
    fn http_10_request_needs_no_host() {
        let (head, framing) = decode(b"GET / HTTP/1.0\r\n\r\n").unwrap().unwrap();
        assert_eq!(head.version(), Version::HTTP_10);
        assert_eq!(framing, BodyFraming::Empty);
    }

    #[test]
    fn http_11_request_without_host_is_rejected() {
        let err = decode(b"GET / HTTP/1.1\r\n\r\n").unwrap_err();
        assert_eq!(err, ParseError::MissingHost);
    }

    #[test]
    fn duplicate_host_is_rejected() {
        let err = decode(b"GET / HTTP/1.1\r\nHost: a\r\nHost: b\r\n\r\n").unwrap_err();
        assert_eq!(err, ParseError::DuplicateHeader { name: "Host" });
    }

    #[test]
    fn unsupported_version() {
        let err = decode(b"GET / HTTP/2.0\r\n\r\n").unwrap_err();
        assert_eq!(err, ParseError::UnsupportedVersion);
        assert_eq!(err.to_string(), "HTTP Version not supported");
    }

    #[test]
    fn chunked_beats_content_length() {
        let (_, framing) = decode(
            b"POST /u HTTP/1.1\r\nHost: a\r\nContent-Length: 10\r\nTransfer-Encoding: chunked\r\n\r\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(framing, BodyFraming::Chunked);
    }

    #[test]
    fn identity_final_coding_falls_back_to_content_length() {
        let (_, framing) = decode(
            b"POST /u HTTP/1.1\r\nHost: a\r\nContent-Length: 5\r\nTransfer-Encoding: identity\r\n\r\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(framing, BodyFraming::Length(5));
    }

    #[test]
    fn content_length_zero_is_an_empty_body() {
        let (_, framing) =
            decode(b"POST /u HTTP/1.1\r\nHost: a\r\nContent-Length: 0\r\n\r\n").unwrap().unwrap();
        assert_eq!(framing, BodyFraming::Empty);
    }

    #[test]
    fn whitespace_around_content_length_is_tolerated() {
        let (_, framing) =
            decode(b"POST /u HTTP/1.1\r\nHost: a\r\nContent-Length:  42 \r\n\r\n").unwrap().unwrap();
        assert_eq!(framing, BodyFraming::Length(42));
    }

    #[test]
    fn fractional_content_length_is_rejected() {
        let err = decode(b"POST /u HTTP/1.1\r\nHost: a\r\nContent-Length: 1.5\r\n\r\n").unwrap_err();
        assert_eq!(err.to_string(), "Invalid Content-Length header value: 1.5");
    }

    #[test]
    fn duplicate_content_length_is_rejected() {
        let err = decode(
            b"POST /u HTTP/1.1\r\nHost: a\r\nContent-Length: 1\r\nContent-Length: 1\r\n\r\n",
        )
        .unwrap_err();
        assert_eq!(err, ParseError::DuplicateHeader { name: "Content-Length" });
    }

    #[test]
    fn oversized_content_length_is_a_413() {
        let settings = ParserSettings::default();
        let req = format!(
            "POST /u HTTP/1.1\r\nHost: a\r\nContent-Length: {}\r\n\r\n",
            settings.max_content_length + 1
        );
        let err = decode(req.as_bytes()).unwrap_err();
        assert_eq!(err.status(), http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn uri_limit_is_enforced() {
        let settings = ParserSettings::default();
        let long = "a".repeat(settings.max_uri_length + 1);
        let err = decode(format!("GET /{long} HTTP/1.1\r\nHost: a\r\n\r\n").as_bytes()).unwrap_err();
        assert_eq!(err, ParseError::UriTooLong { limit: settings.max_uri_length });
    }

    #[test]
    fn cr_in_target_is_rejected() {
        let err = decode(b"GET /a\rb HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidCharacter { .. }));
    }

    #[test]
    fn partial_input_needs_more() {
        assert_eq!(decode(b"GET / HTTP/1.1\r\nHost: a\r\n").unwrap(), None);
    }
}
