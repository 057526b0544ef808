use serde::{Deserialize, Serialize};

/// Limits consulted by the parser state machine.
///
/// Every limit is enforced while the corresponding accumulator grows, so a
/// misbehaving peer can never make the parser buffer more than the configured
/// amount. A settings value is immutable after construction and shared
/// between parsers via `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ParserSettings {
    /// Longest accepted request-target, in octets.
    pub max_uri_length: usize,
    /// Longest accepted response reason phrase, in octets.
    pub max_response_reason_length: usize,
    /// Longest accepted header name.
    pub max_header_name_length: usize,
    /// Longest accepted header value, measured after LWS folding.
    pub max_header_value_length: usize,
    /// Most headers accepted per message (trailers included).
    pub max_header_count: usize,
    /// Largest entity body delivered inline, in octets.
    pub max_content_length: u64,
    /// Longest accepted chunk extension run per chunk, in octets.
    pub max_chunk_ext_length: usize,
    /// Largest accepted single chunk, in octets.
    pub max_chunk_size: u64,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            max_uri_length: 2048,
            max_response_reason_length: 64,
            max_header_name_length: 64,
            max_header_value_length: 8192,
            max_header_count: 64,
            max_content_length: 8 * 1024 * 1024,
            max_chunk_ext_length: 256,
            max_chunk_size: 1024 * 1024,
        }
    }
}
