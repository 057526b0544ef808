//! Error types for HTTP protocol handling
//!
//! [`ParseError`] values are terminal parser states, not exceptions: each one
//! carries a human-readable reason (its `Display` output) and the HTTP status
//! to return to the peer when acting as a server ([`ParseError::status`]).
//! [`SendError`] covers response encoding and IO on the write side, and
//! [`HttpError`] is the top-level wrapper exposed at the API boundary.

use http::StatusCode;
use std::io;
use thiserror::Error;

/// The top-level error type for HTTP operations
#[derive(Debug, Error)]
pub enum HttpError {
    /// Errors that occur while parsing the inbound message stream
    #[error("parse error: {source}")]
    ParseError {
        #[from]
        source: ParseError,
    },

    /// Errors that occur during response generation and sending
    #[error("send error: {source}")]
    SendError {
        #[from]
        source: SendError,
    },
}

/// A terminal parser state: why parsing stopped, and the status to answer with.
///
/// The parser never panics and never raises IO errors; socket-level failures
/// surface as `Closed` events in the pipeline instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A character outside the class the current state accepts
    #[error("Invalid character '{found}', expected {expected}")]
    InvalidCharacter { found: char, expected: &'static str },

    /// Request-target longer than the configured limit
    #[error("URI length exceeds the configured limit of {limit} characters")]
    UriTooLong { limit: usize },

    /// Response reason phrase longer than the configured limit
    #[error("HTTP reason phrase exceeds the configured limit of {limit} characters")]
    ReasonTooLong { limit: usize },

    /// Header name longer than the configured limit; carries the first 50
    /// characters of the offending name
    #[error("HTTP header name exceeds the configured limit of {limit} characters (header '{name}...')")]
    HeaderNameTooLong { name: String, limit: usize },

    /// Header value longer than the configured limit, measured post-folding
    #[error("HTTP header value exceeds the configured limit of {limit} characters (header '{name}')")]
    HeaderValueTooLong { name: String, limit: usize },

    /// More headers than the configured limit
    #[error("HTTP message contains more than the configured limit of {limit} headers")]
    TooManyHeaders { limit: usize },

    /// Status code outside 100..=599 or not exactly three digits
    #[error("Illegal response status code")]
    IllegalStatusCode,

    /// An HTTP version other than 1.0 or 1.1
    #[error("HTTP Version not supported")]
    UnsupportedVersion,

    /// A header that must be unique appeared more than once
    #[error("HTTP message must not contain more than one {name} header")]
    DuplicateHeader { name: &'static str },

    /// Content-Length value that is not a non-negative decimal integer
    #[error("Invalid Content-Length header value: {value}")]
    InvalidContentLength { value: String },

    /// HTTP/1.1 request without a Host header
    #[error("Host header required")]
    MissingHost,

    /// HTTP/1.1 response with no framing information
    #[error("Content-Length header or chunked transfer encoding required")]
    LengthRequired,

    /// Entity larger than the configured inline limit
    #[error("HTTP message Content-Length {length} exceeds the configured limit of {limit}")]
    BodyTooLarge { length: u64, limit: u64 },

    /// Single chunk larger than the configured limit
    #[error("HTTP chunk size {size} exceeds the configured limit of {limit}")]
    ChunkTooLarge { size: u64, limit: u64 },

    /// Chunk size written with more than eight hex digits
    #[error("HTTP chunk size exceeds 8 hexadecimal digits")]
    ChunkSizeTooLong,

    /// Chunk extension run longer than the configured limit
    #[error("HTTP chunk extension exceeds the configured limit of {limit} characters")]
    ChunkExtensionTooLong { limit: usize },

    /// The peer closed the connection in the middle of a message
    #[error("connection closed before message was complete")]
    TruncatedMessage,

    /// An I/O error surfaced through the codec's `Decoder` trait, which
    /// requires a conversion from `std::io::Error`. The parser itself never
    /// raises these; only the underlying transport can.
    #[error("I/O error: {kind:?}")]
    Io { kind: io::ErrorKind },
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        Self::Io { kind: e.kind() }
    }
}

impl ParseError {
    /// Creates a new InvalidCharacter error from the offending octet
    pub fn invalid_character(found: u8, expected: &'static str) -> Self {
        Self::InvalidCharacter { found: found as char, expected }
    }

    /// Creates a new HeaderNameTooLong error, truncating the name to its
    /// first 50 characters
    pub fn header_name_too_long(name: &[u8], limit: usize) -> Self {
        let shown = &name[..name.len().min(50)];
        Self::HeaderNameTooLong { name: String::from_utf8_lossy(shown).into_owned(), limit }
    }

    /// Creates a new HeaderValueTooLong error
    pub fn header_value_too_long(name: &[u8], limit: usize) -> Self {
        Self::HeaderValueTooLong { name: String::from_utf8_lossy(name).into_owned(), limit }
    }

    /// Creates a new InvalidContentLength error
    pub fn invalid_content_length(value: &[u8]) -> Self {
        Self::InvalidContentLength { value: String::from_utf8_lossy(value).into_owned() }
    }

    /// The status code reported to the peer when this error terminates a
    /// server-side parse. 400 unless the production site says otherwise.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedVersion => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            Self::LengthRequired => StatusCode::LENGTH_REQUIRED,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Errors that occur during HTTP response encoding and sending
#[derive(Error, Debug)]
pub enum SendError {
    /// A response part arrived in an order the encoder cannot express
    #[error("invalid response part: {reason}")]
    InvalidPart { reason: String },

    /// I/O error during sending
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    /// Creates a new InvalidPart error
    pub fn invalid_part<S: ToString>(str: S) -> Self {
        Self::InvalidPart { reason: str.to_string() }
    }

    /// Creates a new I/O error
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
