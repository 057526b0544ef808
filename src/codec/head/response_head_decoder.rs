//! State machine for the status line, followed by the header block and the
//! framing decision.
//!
//! Responses carry the cases requests do not: status-driven bodiless
//! messages (1xx/204/304), bodies delimited by connection close, and the 411
//! rejection of an HTTP/1.1 response with no framing information at all.

use crate::codec::head::header_section::HeaderSectionDecoder;
use crate::codec::head::request_head_decoder::{final_coding_is_identity, parse_content_length};
use crate::ensure;
use crate::protocol::{BodyFraming, FieldList, ParseError, ParserSettings, ResponseHead};
use bytes::{Buf, BytesMut};
use http::{StatusCode, Version};
use std::sync::Arc;

const VERSION_PREFIX: &[u8] = b"HTTP/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    VersionPrefix(usize),
    VersionMajor,
    VersionDot,
    VersionMinor,
    AfterVersion,
    /// Accumulating status digits; the payload counts how many were seen
    Status(u8),
    AfterStatus,
    Reason,
    Headers,
}

pub(crate) struct ResponseHeadDecoder {
    settings: Arc<ParserSettings>,
    state: LineState,
    major: u8,
    version: Version,
    status: u16,
    reason: BytesMut,
    section: HeaderSectionDecoder,
}

impl ResponseHeadDecoder {
    pub(crate) fn new(settings: Arc<ParserSettings>) -> Self {
        Self {
            section: HeaderSectionDecoder::new(settings.clone()),
            settings,
            state: LineState::VersionPrefix(0),
            major: 0,
            version: Version::HTTP_11,
            status: 0,
            reason: BytesMut::new(),
        }
    }

    /// True while no octet of the current message has been consumed.
    pub(crate) fn is_idle(&self) -> bool {
        self.state == LineState::VersionPrefix(0)
    }

    pub(crate) fn decode(&mut self, src: &mut BytesMut) -> Result<Option<(ResponseHead, BodyFraming)>, ParseError> {
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
                    self.state = LineState::AfterVersion;
                }
                c => return Err(ParseError::invalid_character(c, "DIGIT")),
            },

            LineState::AfterVersion => match b {
                b' ' => self.state = LineState::Status(0),
                c => return Err(ParseError::invalid_character(c, "SP")),
            },

            LineState::Status(seen) => match b {
                c if c.is_ascii_digit() => {
                    let digit = (c - b'0') as u16;
                    // the first digit pins the class: 1xx through 5xx only
                    ensure!(seen > 0 || (1..=5).contains(&digit), ParseError::IllegalStatusCode);
                    self.status = self.status * 10 + digit;
                    self.state = if seen == 2 { LineState::AfterStatus } else { LineState::Status(seen + 1) };
                }
                _ => return Err(ParseError::IllegalStatusCode),
            },

            LineState::AfterStatus => match b {
                b' ' => self.state = LineState::Reason,
                b'\r' => {}
                b'\n' => self.state = LineState::Headers,
                _ => return Err(ParseError::IllegalStatusCode),
            },

            LineState::Reason => match b {
                b'\r' => {}
                b'\n' => self.state = LineState::Headers,
                c => {
                    ensure!(
                        self.reason.len() < self.settings.max_response_reason_length,
                        ParseError::ReasonTooLong { limit: self.settings.max_response_reason_length }
                    );
                    self.reason.extend_from_slice(&[c]);
                }
            },

            LineState::Headers => unreachable!("header block is consumed in decode"),
        }

        Ok(())
    }

    fn finish(&mut self, fields: FieldList) -> Result<(ResponseHead, BodyFraming), ParseError> {
        // status was accumulated from exactly three digits with a 1..=5 first
        // digit, always in StatusCode's accepted range
        let status = StatusCode::from_u16(self.status).unwrap();
        let framing = response_framing(&fields, status, self.version, &self.settings)?;
        let head = ResponseHead::from_parts(self.version, status, self.reason.split().freeze(), fields);
        Ok((head, framing))
    }
}

/// The framing decision for responses, in strict priority order.
fn response_framing(
    fields: &FieldList,
    status: StatusCode,
    version: Version,
    settings: &ParserSettings,
) -> Result<BodyFraming, ParseError> {
    ensure!(fields.count("content-length") <= 1, ParseError::DuplicateHeader { name: "Content-Length" });

    // 1xx, 204 and 304 never have a body, whatever the framing headers say
    if status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return Ok(BodyFraming::Empty);
    }

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

    let connection = fields.get("connection");
    let close = connection.map(|v| trim(v.as_bytes()).eq_ignore_ascii_case(b"close")).unwrap_or(false);
    if close || (connection.is_none() && version == Version::HTTP_10) {
        return Ok(BodyFraming::UntilClose);
    }

    Err(ParseError::LengthRequired)
}

fn trim(mut bytes: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = bytes {
        bytes = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = bytes {
        bytes = rest;
    }
    bytes
}
