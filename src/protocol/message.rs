//! Message part model.
//!
//! A parsed message surfaces as a short sequence of progressive parts: either
//! a single [`MessageItem::Complete`] carrying the whole entity inline, or a
//! [`MessageItem::ChunkedStart`] followed by one [`MessageItem::Chunk`] per
//! wire chunk and exactly one [`MessageItem::ChunkedEnd`]. The generic `H` is
//! the head type (request or response).

use crate::protocol::FieldList;
use bytes::Bytes;

/// One progressive part of a parsed (or to-be-rendered) HTTP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageItem<H> {
    /// A whole message: head plus the entire entity body inline.
    Complete { head: H, body: Bytes },
    /// Start of a chunked message; chunks follow.
    ChunkedStart(H),
    /// One wire chunk with its extensions. The payload is never empty.
    Chunk(Chunk),
    /// End of a chunked message: zero-chunk extensions and trailer headers.
    ChunkedEnd(ChunkedEnd),
}

impl<H> MessageItem<H> {
    /// True for the first part of any message (`Complete` or `ChunkedStart`).
    #[inline]
    pub fn is_message_start(&self) -> bool {
        matches!(self, MessageItem::Complete { .. } | MessageItem::ChunkedStart(_))
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!(self, MessageItem::Complete { .. })
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, MessageItem::Chunk(_))
    }

    #[inline]
    pub fn is_chunked_end(&self) -> bool {
        matches!(self, MessageItem::ChunkedEnd(_))
    }

    /// The message head, when this part carries one.
    pub fn head(&self) -> Option<&H> {
        match self {
            MessageItem::Complete { head, .. } | MessageItem::ChunkedStart(head) => Some(head),
            _ => None,
        }
    }

    pub fn into_head(self) -> Option<H> {
        match self {
            MessageItem::Complete { head, .. } | MessageItem::ChunkedStart(head) => Some(head),
            _ => None,
        }
    }
}

/// A single body chunk plus its ordered extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Bytes,
    pub extensions: Vec<ChunkExtension>,
}

impl Chunk {
    pub fn new(data: Bytes) -> Self {
        Self { data, extensions: Vec::new() }
    }
}

/// A `;name` or `;name=value` chunk extension. Values may have been written
/// as quoted strings on the wire; they are stored unquoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkExtension {
    pub name: Bytes,
    pub value: Option<Bytes>,
}

/// The terminal part of a chunked message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkedEnd {
    pub extensions: Vec<ChunkExtension>,
    pub trailer: FieldList,
}

/// The framing decision computed at end-of-headers: how the entity body is
/// delimited.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body follows the head.
    Empty,
    /// Exactly this many octets follow.
    Length(u64),
    /// Chunked transfer coding.
    Chunked,
    /// The body runs until the peer closes the connection.
    UntilClose,
}

impl BodyFraming {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, BodyFraming::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, BodyFraming::Empty)
    }
}
