//! HTTP codec module for incremental message decoding and response encoding.
//!
//! The decoders are byte-at-a-time state machines: each one consumes input
//! octets, mutating a state tag and bounded accumulators in place, and emits
//! progressive [`MessageItem`](crate::protocol::MessageItem) parts. They
//! accept any TCP fragmentation — the emitted part sequence for a given byte
//! stream never depends on how the stream was sliced.
//!
//! # Components
//!
//! - [`RequestDecoder`]: server side, decodes inbound requests
//! - [`ResponseDecoder`]: client side, decodes inbound responses
//! - [`ResponseEncoder`]: server side, renders outbound response parts
//!
//! All three implement the `tokio_util::codec` traits, so they plug directly
//! into `FramedRead`/`FramedWrite`:
//!
//! ```no_run
//! use cascade_http::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::new();
//! let part = decoder.decode(&mut buffer);
//! ```

mod body;
mod chars;
mod head;
mod request_decoder;
mod response_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_decoder::ResponseDecoder;
pub use response_encoder::ResponseEncoder;
