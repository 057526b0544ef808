//! Wire-order header sequence.
//!
//! The parser guarantees that consumers observe headers in the order they
//! appeared on the wire, which a multimap cannot promise. [`FieldList`] is a
//! growable ordered sequence of name/value pairs; lookups compare names
//! case-insensitively (stored names are already lowercase tokens).

use http::{HeaderName, HeaderValue};

/// A single header field. The name is a lowercased token; the value is kept
/// verbatim apart from LWS folding and trailing-whitespace trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderField {
    pub fn new(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }

    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    pub fn value(&self) -> &HeaderValue {
        &self.value
    }

    pub fn into_parts(self) -> (HeaderName, HeaderValue) {
        (self.name, self.value)
    }
}

/// An ordered sequence of header fields, preserving wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldList {
    fields: Vec<HeaderField>,
}

impl FieldList {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { fields: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, name: HeaderName, value: HeaderValue) {
        self.fields.push(HeaderField::new(name, value));
    }

    /// First value carried under `name`, compared case-insensitively.
    pub fn get<'a>(&'a self, name: &'a str) -> Option<&'a HeaderValue> {
        self.get_all(name).next()
    }

    /// All values carried under `name`, in wire order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a HeaderValue> + 'a {
        self.fields.iter().filter(move |f| f.name.as_str().eq_ignore_ascii_case(name)).map(|f| &f.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// How many fields carry `name`.
    pub fn count(&self, name: &str) -> usize {
        self.get_all(name).count()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderField> {
        self.fields.iter()
    }
}

impl<'a> IntoIterator for &'a FieldList {
    type Item = &'a HeaderField;
    type IntoIter = std::slice::Iter<'a, HeaderField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl FromIterator<(HeaderName, HeaderValue)> for FieldList {
    fn from_iter<T: IntoIterator<Item = (HeaderName, HeaderValue)>>(iter: T) -> Self {
        Self { fields: iter.into_iter().map(|(name, value)| HeaderField::new(name, value)).collect() }
    }
}
