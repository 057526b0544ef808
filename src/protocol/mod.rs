//! Protocol-level value types shared by the codec and the pipeline.
//!
//! This module contains the message part model ([`MessageItem`] and friends),
//! the request/response head types, the wire-order header sequence
//! ([`FieldList`]), the parser limits ([`ParserSettings`]) and the error
//! hierarchy.

mod error;
mod header;
mod message;
mod request;
mod response;
mod settings;

pub use error::{HttpError, ParseError, SendError};
pub use header::{FieldList, HeaderField};
pub use message::{BodyFraming, Chunk, ChunkExtension, ChunkedEnd, MessageItem};
pub use request::RequestHead;
pub use response::ResponseHead;
pub use settings::ParserSettings;
