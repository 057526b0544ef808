//! Request head value type.

use crate::protocol::FieldList;
use bytes::Bytes;
use http::{Method, Version};

/// The start of a request: method, opaque request-target, protocol version
/// and the header fields in wire order.
///
/// The target is kept as the raw octet string from the request line; this
/// layer performs no URI normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    method: Method,
    target: Bytes,
    version: Version,
    headers: FieldList,
}

impl RequestHead {
    pub fn new(method: Method, target: Bytes, version: Version, headers: FieldList) -> Self {
        Self { method, target, version, headers }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The raw request-target octets.
    pub fn target(&self) -> &Bytes {
        &self.target
    }

    /// The request-target as a str, when it is valid UTF-8.
    pub fn target_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.target).ok()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &FieldList {
        &self.headers
    }
}
