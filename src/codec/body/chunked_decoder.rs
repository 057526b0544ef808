//! Decoder for the chunked transfer coding.
//!
//! Each chunk is a hex size line (at most eight hex digits), optional
//! `;name[=value]` extensions with quoted-string values, CRLF, exactly
//! `size` data octets and a trailing CRLF. A zero size ends the message via
//! the trailer header block. Chunk data is buffered and emitted as one part
//! per wire chunk, so fragmentation of the input never changes the emitted
//! sequence.

use crate::codec::head::HeaderSectionDecoder;
use crate::ensure;
use crate::protocol::{Chunk, ChunkExtension, ChunkedEnd, ParseError, ParserSettings};
use bytes::{Buf, BytesMut};
use std::cmp;
use std::mem;
use std::sync::Arc;
use tracing::trace;
use ChunkedState::*;

/// A decoded piece of a chunked body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChunkedItem {
    Chunk(Chunk),
    End(ChunkedEnd),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size in hex
    Size,
    /// Whitespace after the size
    SizeLws,
    /// Extension name after ';'
    ExtName,
    /// Unquoted extension value
    ExtValue,
    /// Inside a quoted-string extension value
    ExtQuoted,
    /// Octet after a backslash in a quoted-string
    ExtQuotedEscape,
    /// Read chunk data
    Data,
    /// CRLF after chunk data
    AfterData,
    /// Trailer header block after the zero chunk
    Trailer,
    /// Terminal state
    End,
}

pub(crate) struct ChunkedDecoder {
    settings: Arc<ParserSettings>,
    state: ChunkedState,
    size: u64,
    size_digits: u8,
    ext_len: usize,
    ext_name: BytesMut,
    ext_value: BytesMut,
    ext_has_value: bool,
    extensions: Vec<ChunkExtension>,
    data: BytesMut,
    trailer: HeaderSectionDecoder,
}

impl ChunkedDecoder {
    pub(crate) fn new(settings: Arc<ParserSettings>) -> Self {
        Self {
            trailer: HeaderSectionDecoder::new(settings.clone()),
            settings,
            state: Size,
            size: 0,
            size_digits: 0,
            ext_len: 0,
            ext_name: BytesMut::new(),
            ext_value: BytesMut::new(),
            ext_has_value: false,
            extensions: Vec::new(),
            data: BytesMut::new(),
        }
    }

    pub(crate) fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ChunkedItem>, ParseError> {
        loop {
            match self.state {
                Data => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let take = cmp::min(self.size, src.len() as u64) as usize;
                    self.data.extend_from_slice(&src.split_to(take));
                    self.size -= take as u64;
                    if self.size > 0 {
                        return Ok(None);
                    }
                    self.state = AfterData;
                    let chunk =
                        Chunk { data: self.data.split().freeze(), extensions: mem::take(&mut self.extensions) };
                    trace!(len = chunk.data.len(), "read chunk");
                    return Ok(Some(ChunkedItem::Chunk(chunk)));
                }

                Trailer => {
                    return match self.trailer.decode(src)? {
                        Some(trailer) => {
                            trace!("finished reading chunked message");
                            self.state = End;
                            Ok(Some(ChunkedItem::End(ChunkedEnd {
                                extensions: mem::take(&mut self.extensions),
                                trailer,
                            })))
                        }
                        None => Ok(None),
                    };
                }

                End => return Ok(None),

                _ => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let b = src.get_u8();
                    self.step(b)?;
                }
            }
        }
    }

    fn step(&mut self, b: u8) -> Result<(), ParseError> {
        match self.state {
            Size => match b {
                c if c.is_ascii_hexdigit() => {
                    ensure!(self.size_digits < 8, ParseError::ChunkSizeTooLong);
                    self.size = self.size * 16 + hex_value(c);
                    self.size_digits += 1;
                }
                b';' => {
                    ensure!(self.size_digits > 0, ParseError::invalid_character(b, "HEX DIGIT"));
                    self.bump_ext()?;
                    self.state = ExtName;
                }
                b' ' | b'\t' => {
                    ensure!(self.size_digits > 0, ParseError::invalid_character(b, "HEX DIGIT"));
                    self.state = SizeLws;
                }
                b'\r' => {}
                b'\n' => {
                    ensure!(self.size_digits > 0, ParseError::invalid_character(b, "HEX DIGIT"));
                    self.finish_size_line()?;
                }
                c => return Err(ParseError::invalid_character(c, "HEX DIGIT")),
            },

            SizeLws => match b {
                b' ' | b'\t' | b'\r' => {}
                b';' => {
                    self.bump_ext()?;
                    self.state = ExtName;
                }
                b'\n' => self.finish_size_line()?,
                c => return Err(ParseError::invalid_character(c, "LWS, ';' or CRLF")),
            },

            ExtName => {
                self.bump_ext()?;
                match b {
                    b'=' => {
                        self.ext_has_value = true;
                        self.state = ExtValue;
                    }
                    b';' => self.commit_extension(),
                    b' ' | b'\t' | b'\r' => {}
                    b'\n' => {
                        self.commit_extension();
                        self.finish_size_line()?;
                    }
                    c if crate::codec::chars::is_token_char(c) => self.ext_name.extend_from_slice(&[c]),
                    c => return Err(ParseError::invalid_character(c, "TOKEN CHAR")),
                }
            }

            ExtValue => {
                self.bump_ext()?;
                match b {
                    b'"' if self.ext_value.is_empty() => self.state = ExtQuoted,
                    b';' => {
                        self.commit_extension();
                        self.state = ExtName;
                    }
                    b' ' | b'\t' | b'\r' => {}
                    b'\n' => {
                        self.commit_extension();
                        self.finish_size_line()?;
                    }
                    c => self.ext_value.extend_from_slice(&[c]),
                }
            }

            ExtQuoted => {
                self.bump_ext()?;
                match b {
                    b'"' => {
                        self.commit_extension();
                        self.state = SizeLws;
                    }
                    b'\\' => self.state = ExtQuotedEscape,
                    b'\r' => {}
                    b'\n' => return Err(ParseError::invalid_character(b, "QUOTED-STRING CHAR")),
                    c => self.ext_value.extend_from_slice(&[c]),
                }
            }

            ExtQuotedEscape => {
                self.bump_ext()?;
                self.ext_value.extend_from_slice(&[b]);
                self.state = ExtQuoted;
            }

            AfterData => match b {
                b'\r' => {}
                b'\n' => {
                    self.size = 0;
                    self.size_digits = 0;
                    self.ext_len = 0;
                    self.state = Size;
                }
                c => return Err(ParseError::invalid_character(c, "CR or LF")),
            },

            Data | Trailer | End => unreachable!("handled in decode"),
        }

        Ok(())
    }

    /// The size line is finished: route to data, or to the trailer block for
    /// the zero chunk.
    fn finish_size_line(&mut self) -> Result<(), ParseError> {
        if self.size == 0 {
            self.state = Trailer;
        } else {
            ensure!(
                self.size <= self.settings.max_chunk_size,
                ParseError::ChunkTooLarge { size: self.size, limit: self.settings.max_chunk_size }
            );
            self.state = Data;
        }
        Ok(())
    }

    fn commit_extension(&mut self) {
        if !self.ext_name.is_empty() {
            let value = self.ext_has_value.then(|| self.ext_value.split().freeze());
            self.extensions.push(ChunkExtension { name: self.ext_name.split().freeze(), value });
        }
        self.ext_name.clear();
        self.ext_value.clear();
        self.ext_has_value = false;
    }

    fn bump_ext(&mut self) -> Result<(), ParseError> {
        self.ext_len += 1;
        ensure!(
            self.ext_len <= self.settings.max_chunk_ext_length,
            ParseError::ChunkExtensionTooLong { limit: self.settings.max_chunk_ext_length }
        );
        Ok(())
    }
}

fn hex_value(b: u8) -> u64 {
    match b {
        b'0'..=b'9' => (b - b'0') as u64,
        b'a'..=b'f' => (b + 10 - b'a') as u64,
        _ => (b + 10 - b'A') as u64,
    }
}
