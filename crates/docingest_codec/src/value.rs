//! Dynamic CBOR value type.

use crate::encoder::to_canonical_cbor;
use std::cmp::Ordering;

/// CBOR tag for a 16-byte UUID (RFC 9562 registration).
pub const TAG_UUID: u64 = 37;

/// CBOR tag for an identifier, used here for namespaced keywords.
pub const TAG_KEYWORD: u64 = 39;

/// Private tag for integer milliseconds since the Unix epoch.
pub const TAG_TIMESTAMP_MILLIS: u64 = 61_000;

/// A dynamic CBOR value.
///
/// Every log element and document body is expressed as a `Value`. Floats
/// are deliberately absent: two writers must never disagree on the bytes
/// of an entry because of float formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values, order significant.
    Array(Vec<Value>),
    /// Map of key-value pairs.
    ///
    /// Construct through [`Value::map`] to keep pairs in canonical order;
    /// the encoder re-sorts regardless.
    Map(Vec<(Value, Value)>),
    /// Tagged item (CBOR major type 6).
    Tagged(u64, Box<Value>),
}

impl Value {
    /// Create a map value with keys in canonical order.
    pub fn map(mut pairs: Vec<(Value, Value)>) -> Self {
        pairs.sort_by(|a, b| a.0.cmp_canonical(&b.0));
        Value::Map(pairs)
    }

    /// Create a keyword, e.g. `tx/put`.
    pub fn keyword(name: impl Into<String>) -> Self {
        Value::Tagged(TAG_KEYWORD, Box::new(Value::Text(name.into())))
    }

    /// Create a UUID value from its 16 raw bytes.
    pub fn uuid(bytes: [u8; 16]) -> Self {
        Value::Tagged(TAG_UUID, Box::new(Value::Bytes(bytes.to_vec())))
    }

    /// Create a timestamp from milliseconds since the Unix epoch.
    pub fn timestamp_millis(millis: i64) -> Self {
        Value::Tagged(TAG_TIMESTAMP_MILLIS, Box::new(Value::Integer(millis)))
    }

    /// Compare two values by the ordering of their canonical encodings.
    ///
    /// Canonical CBOR orders encoded items length-first, then bytewise.
    /// Values that cannot be encoded (duplicate keys, excessive nesting)
    /// compare equal here and are rejected later by the encoder.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        match (to_canonical_cbor(self), to_canonical_cbor(other)) {
            (Ok(a), Ok(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(&b)),
            _ => Ordering::Equal,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get the tag and inner value, if this is a tagged item.
    pub fn as_tagged(&self) -> Option<(u64, &Value)> {
        match self {
            Value::Tagged(tag, inner) => Some((*tag, inner)),
            _ => None,
        }
    }

    /// Get the keyword name, if this is a keyword.
    pub fn as_keyword(&self) -> Option<&str> {
        match self.as_tagged() {
            Some((TAG_KEYWORD, inner)) => inner.as_text(),
            _ => None,
        }
    }

    /// Get the timestamp in epoch milliseconds, if this is a timestamp.
    pub fn as_timestamp_millis(&self) -> Option<i64> {
        match self.as_tagged() {
            Some((TAG_TIMESTAMP_MILLIS, inner)) => inner.as_integer(),
            _ => None,
        }
    }

    /// Look up a text key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
