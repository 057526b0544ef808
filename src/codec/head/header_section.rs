//! State machine for a block of header lines.
//!
//! Consumes one octet at a time and produces the finished [`FieldList`] when
//! the empty line ending the block arrives. The same machine parses message
//! headers and chunked trailer headers.
//!
//! Line handling follows the wire rules: CRLF terminates a line, a bare LF is
//! tolerated, a bare CR is ignored. Whether an LF ends the current header or
//! folds the next line into it is only known once the first octet of the next
//! line arrives, so a header is committed on that lookahead octet, never on
//! the LF itself.

use crate::codec::chars::{is_ctl, is_token_char, to_lower};
use crate::ensure;
use crate::protocol::{FieldList, ParseError, ParserSettings};
use bytes::{Buf, BytesMut};
use http::{HeaderName, HeaderValue};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionState {
    /// Accumulating a header name
    Name,
    /// Inside LWS on the name side of the colon
    NameLws,
    /// Skipping LWS before (or within a folded) value
    ValueLws,
    /// Accumulating a header value
    Value,
    /// An LF was consumed; the next octet decides folding vs. commit
    LineBreak,
}

pub(crate) struct HeaderSectionDecoder {
    settings: Arc<ParserSettings>,
    state: SectionState,
    fields: FieldList,
    name: BytesMut,
    value: BytesMut,
    in_value: bool,
}

impl HeaderSectionDecoder {
    pub(crate) fn new(settings: Arc<ParserSettings>) -> Self {
        Self {
            settings,
            state: SectionState::Name,
            fields: FieldList::new(),
            name: BytesMut::new(),
            value: BytesMut::new(),
            in_value: false,
        }
    }

    /// Feeds octets until the block is finished or `src` is exhausted.
    ///
    /// Returns the completed field list in wire order, or `None` when more
    /// input is needed.
    pub(crate) fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FieldList>, ParseError> {
        while !src.is_empty() {
            if self.step(src.get_u8())? {
                return Ok(Some(std::mem::take(&mut self.fields)));
            }
        }
        Ok(None)
    }

    /// Consumes one octet; returns true when the header block is complete.
    fn step(&mut self, b: u8) -> Result<bool, ParseError> {
        match self.state {
            SectionState::Name => match b {
                b':' if !self.name.is_empty() => {
                    self.in_value = true;
                    self.state = SectionState::ValueLws;
                }
                b'\r' => {}
                b'\n' => {
                    if self.name.is_empty() {
                        return Ok(true);
                    }
                    self.state = SectionState::LineBreak;
                }
                b' ' | b'\t' if !self.name.is_empty() => self.state = SectionState::NameLws,
                c if is_token_char(c) => {
                    ensure!(
                        self.name.len() < self.settings.max_header_name_length,
                        ParseError::header_name_too_long(&self.name, self.settings.max_header_name_length)
                    );
                    self.name.extend_from_slice(&[to_lower(c)]);
                }
                c => return Err(ParseError::invalid_character(c, "TOKEN CHAR, LWS or COLON")),
            },

            SectionState::NameLws => match b {
                b' ' | b'\t' | b'\r' => {}
                b'\n' => self.state = SectionState::LineBreak,
                b':' => {
                    self.in_value = true;
                    self.state = SectionState::ValueLws;
                }
                c => return Err(ParseError::invalid_character(c, "COLON or LWS")),
            },

            SectionState::ValueLws => match b {
                b' ' | b'\t' | b'\r' => {}
                b'\n' => self.state = SectionState::LineBreak,
                c => {
                    self.state = SectionState::Value;
                    return self.step(c);
                }
            },

            SectionState::Value => match b {
                b'\r' => {}
                b'\n' => self.state = SectionState::LineBreak,
                c if c != b'\t' && is_ctl(c) => {
                    return Err(ParseError::invalid_character(c, "printable character or HTAB"))
                }
                c => self.push_value_octet(c)?,
            },

            SectionState::LineBreak => match b {
                b' ' | b'\t' => {
                    if self.in_value {
                        // folding: the line break and leading LWS collapse
                        // into a single SP
                        self.trim_value_end();
                        if !self.value.is_empty() {
                            self.push_value_octet(b' ')?;
                        }
                        self.state = SectionState::ValueLws;
                    } else {
                        self.state = SectionState::NameLws;
                    }
                }
                b'\r' => {}
                b'\n' => {
                    self.commit()?;
                    return Ok(true);
                }
                c => {
                    self.commit()?;
                    self.state = SectionState::Name;
                    return self.step(c);
                }
            },
        }

        Ok(false)
    }

    fn push_value_octet(&mut self, b: u8) -> Result<(), ParseError> {
        ensure!(
            self.value.len() < self.settings.max_header_value_length,
            ParseError::header_value_too_long(&self.name, self.settings.max_header_value_length)
        );
        self.value.extend_from_slice(&[b]);
        Ok(())
    }

    fn trim_value_end(&mut self) {
        while matches!(self.value.last(), Some(&b' ') | Some(&b'\t')) {
            self.value.truncate(self.value.len() - 1);
        }
    }

    /// Commits the in-progress header to the field list.
    fn commit(&mut self) -> Result<(), ParseError> {
        ensure!(
            self.fields.len() < self.settings.max_header_count,
            ParseError::TooManyHeaders { limit: self.settings.max_header_count }
        );

        self.trim_value_end();

        // the accumulator only ever holds lowercased token chars, which is a
        // valid header name by construction
        let name = HeaderName::from_bytes(&self.name).unwrap();

        // SAFETY: the value accumulator rejects CTL octets other than HTAB,
        // a subset of the octets HeaderValue accepts
        let value = unsafe { HeaderValue::from_maybe_shared_unchecked(self.value.split().freeze()) };

        self.fields.push(name, value);
        self.name.clear();
        self.in_value = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Result<FieldList, ParseError> {
        let mut decoder = HeaderSectionDecoder::new(Arc::new(ParserSettings::default()));
        let mut src = BytesMut::from(input);
        decoder.decode(&mut src).map(|fields| fields.expect("incomplete header block"))
    }

    fn pairs(fields: &FieldList) -> Vec<(String, String)> {
        fields
            .iter()
            .map(|f| (f.name().as_str().to_owned(), String::from_utf8_lossy(f.value().as_bytes()).into_owned()))
            .collect()
    }

    #[test]
    fn plain_headers_in_wire_order() {
        let fields = decode_all(b"Host: example.com\r\nAccept: */*\r\n\r\n").unwrap();
        assert_eq!(
            pairs(&fields),
            vec![("host".into(), "example.com".into()), ("accept".into(), "*/*".into())]
        );
    }

    #[test]
    fn names_are_lowercased_values_verbatim() {
        let fields = decode_all(b"USER-agent: Curl/7.19.7\r\n\r\n").unwrap();
        assert_eq!(pairs(&fields), vec![("user-agent".into(), "Curl/7.19.7".into())]);
    }

    #[test]
    fn empty_value_is_not_an_error() {
        let fields = decode_all(b"Accept: \r\n\r\n").unwrap();
        assert_eq!(pairs(&fields), vec![("accept".into(), "".into())]);
    }

    #[test]
    fn folded_value_collapses_to_single_sp() {
        let fields = decode_all(b"User-Agent: curl/7.19.7\r\n abc\r\n    xyz\r\n\r\n").unwrap();
        assert_eq!(pairs(&fields), vec![("user-agent".into(), "curl/7.19.7 abc xyz".into())]);
    }

    #[test]
    fn fold_before_colon_continues_the_name_line() {
        let fields = decode_all(b"Accept\r\n : */*  \r\n\r\n").unwrap();
        assert_eq!(pairs(&fields), vec![("accept".into(), "*/*".into())]);
    }

    #[test]
    fn bare_lf_lines_are_tolerated() {
        let fields = decode_all(b"Host: a\nAccept: b\n\n").unwrap();
        assert_eq!(pairs(&fields), vec![("host".into(), "a".into()), ("accept".into(), "b".into())]);
    }

    #[test]
    fn name_at_limit_succeeds_one_more_fails() {
        let settings = ParserSettings::default();
        let exact = "x".repeat(settings.max_header_name_length);
        let fields = decode_all(format!("{exact}: v\r\n\r\n").as_bytes()).unwrap();
        assert_eq!(fields.len(), 1);

        let over = "x".repeat(settings.max_header_name_length + 1);
        let err = decode_all(format!("{over}: v\r\n\r\n").as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::HeaderNameTooLong { .. }));
    }

    #[test]
    fn value_over_limit_names_the_header() {
        let settings = ParserSettings::default();
        let big = "v".repeat(settings.max_header_value_length + 1);
        let err = decode_all(format!("Cookie: {big}\r\n\r\n").as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "HTTP header value exceeds the configured limit of {} characters (header 'cookie')",
                settings.max_header_value_length
            )
        );
    }

    #[test]
    fn non_token_char_in_name_is_rejected() {
        let err = decode_all(b"User@Agent: x\r\n\r\n").unwrap_err();
        assert_eq!(err.to_string(), "Invalid character '@', expected TOKEN CHAR, LWS or COLON");
    }

    #[test]
    fn header_count_limit() {
        let mut block = String::new();
        for i in 0..=ParserSettings::default().max_header_count {
            block.push_str(&format!("h{i}: v\r\n"));
        }
        block.push_str("\r\n");
        let err = decode_all(block.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::TooManyHeaders { .. }));
    }

    #[test]
    fn incremental_feeding_matches_one_shot() {
        let input = b"Host: example.com\r\nAccept: */*\r\n\r\n";
        let mut decoder = HeaderSectionDecoder::new(Arc::new(ParserSettings::default()));
        let mut fields = None;
        for &b in input.iter() {
            let mut src = BytesMut::from(&[b][..]);
            if let Some(done) = decoder.decode(&mut src).unwrap() {
                fields = Some(done);
            }
        }
        assert_eq!(pairs(&fields.unwrap()), pairs(&decode_all(input).unwrap()));
    }
}
