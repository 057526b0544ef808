//! Response head value type.

use crate::protocol::FieldList;
use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode, Version};

/// The start of a response: protocol version, status, reason phrase and the
/// header fields in wire order.
///
/// The reason phrase is an opaque octet string (ISO-8859-1 passed through);
/// an empty reason on an outbound response is rendered as the status code's
/// canonical reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    version: Version,
    status: StatusCode,
    reason: Bytes,
    headers: FieldList,
}

impl ResponseHead {
    /// An outbound HTTP/1.1 head with no headers and the canonical reason.
    pub fn new(status: StatusCode) -> Self {
        Self { version: Version::HTTP_11, status, reason: Bytes::new(), headers: FieldList::new() }
    }

    pub fn from_parts(version: Version, status: StatusCode, reason: Bytes, headers: FieldList) -> Self {
        Self { version, status, reason, headers }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The raw reason-phrase octets; empty when none was sent.
    pub fn reason(&self) -> &Bytes {
        &self.reason
    }

    pub fn headers(&self) -> &FieldList {
        &self.headers
    }

    pub fn push_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.push(name, value);
        self
    }
}
