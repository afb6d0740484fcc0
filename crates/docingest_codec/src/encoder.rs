//! Canonical CBOR encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use crate::MAX_NESTING_DEPTH;

/// Encode a value to canonical CBOR bytes.
///
/// Output follows the core deterministic encoding rules of RFC 8949
/// section 4.2.1:
/// - Map keys are sorted by their encoded form (length-first, then bytewise)
/// - Integers, lengths and tags use the shortest possible head
/// - No indefinite-length encoding
///
/// # Errors
///
/// Returns an error if a map repeats a key or nesting exceeds
/// [`MAX_NESTING_DEPTH`].
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder.
///
/// Several values may be written back to back; the caller decides how
/// they are framed.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        self.write_value(value, 0)
    }

    /// Write an array header for `len` items the caller will encode next.
    pub fn begin_array(&mut self, len: usize) {
        self.write_head(4, len as u64);
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn write_value(&mut self, value: &Value, depth: usize) -> CodecResult<()> {
        if depth > MAX_NESTING_DEPTH {
            return Err(CodecError::NestingTooDeep {
                max_depth: MAX_NESTING_DEPTH,
            });
        }

        match value {
            // Simple values 20/21/22.
            Value::Bool(false) => self.buffer.push(0xf4),
            Value::Bool(true) => self.buffer.push(0xf5),
            Value::Null => self.buffer.push(0xf6),
            Value::Integer(n) => self.write_integer(*n),
            Value::Bytes(b) => {
                self.write_head(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.write_head(3, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.write_head(4, items.len() as u64);
                for item in items {
                    self.write_value(item, depth + 1)?;
                }
            }
            Value::Map(pairs) => self.write_map(pairs, depth)?,
            Value::Tagged(tag, inner) => {
                self.write_head(6, *tag);
                self.write_value(inner, depth + 1)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_integer(&mut self, n: i64) {
        if n >= 0 {
            self.write_head(0, n as u64);
        } else {
            // Major type 1 carries -1 - n, which is non-negative for any negative i64.
            self.write_head(1, (-1 - n) as u64);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_head(&mut self, major_type: u8, arg: u64) {
        let mt = major_type << 5;

        if arg < 24 {
            self.buffer.push(mt | arg as u8);
        } else if let Ok(v) = u8::try_from(arg) {
            self.buffer.push(mt | 24);
            self.buffer.push(v);
        } else if let Ok(v) = u16::try_from(arg) {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&v.to_be_bytes());
        } else if let Ok(v) = u32::try_from(arg) {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&v.to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&arg.to_be_bytes());
        }
    }

    fn write_map(&mut self, pairs: &[(Value, Value)], depth: usize) -> CodecResult<()> {
        let mut keyed = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let mut key_encoder = CanonicalEncoder::new();
            key_encoder.write_value(key, depth + 1)?;
            keyed.push((key_encoder.into_bytes(), value));
        }

        keyed.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));
        if keyed.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(CodecError::DuplicateKey);
        }

        self.write_head(5, pairs.len() as u64);
        for (key_bytes, value) in keyed {
            self.buffer.extend_from_slice(&key_bytes);
            self.write_value(value, depth + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn encode_simple_values() {
        assert_eq!(to_canonical_cbor(&Value::Null).unwrap(), vec![0xf6]);
        assert_eq!(to_canonical_cbor(&Value::Bool(false)).unwrap(), vec![0xf4]);
        assert_eq!(to_canonical_cbor(&Value::Bool(true)).unwrap(), vec![0xf5]);
    }

    #[test]
    fn integers_use_shortest_head() {
        let cases: &[(i64, &[u8])] = &[
            (0, &[0x00]),
            (23, &[0x17]),
            (24, &[0x18, 24]),
            (255, &[0x18, 0xff]),
            (256, &[0x19, 0x01, 0x00]),
            (65_536, &[0x1a, 0x00, 0x01, 0x00, 0x00]),
            (-1, &[0x20]),
            (-24, &[0x37]),
            (-25, &[0x38, 24]),
            (i64::MIN, &[0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]),
        ];

        for (n, expected) in cases {
            assert_eq!(&to_canonical_cbor(&Value::Integer(*n)).unwrap(), expected, "{n}");
        }
    }

    #[test]
    fn encode_strings() {
        assert_eq!(to_canonical_cbor(&Value::Bytes(vec![])).unwrap(), vec![0x40]);
        assert_eq!(
            to_canonical_cbor(&Value::Bytes(vec![1, 2, 3])).unwrap(),
            vec![0x43, 1, 2, 3]
        );
        assert_eq!(
            to_canonical_cbor(&text("hello")).unwrap(),
            vec![0x65, b'h', b'e', b'l', b'l', b'o']
        );
    }

    #[test]
    fn encode_array_preserves_order() {
        let value = Value::Array(vec![Value::Integer(2), Value::Integer(1)]);
        assert_eq!(to_canonical_cbor(&value).unwrap(), vec![0x82, 0x02, 0x01]);
    }

    #[test]
    fn encode_keyword_tag() {
        // tag 39 needs a one-byte argument: d8 27
        let bytes = to_canonical_cbor(&Value::keyword("a/b")).unwrap();
        assert_eq!(bytes, vec![0xd8, 0x27, 0x63, b'a', b'/', b'b']);
    }

    #[test]
    fn encode_timestamp_tag() {
        let bytes = to_canonical_cbor(&Value::timestamp_millis(1)).unwrap();
        // 61000 = 0xee48, two-byte tag argument
        assert_eq!(bytes, vec![0xd9, 0xee, 0x48, 0x01]);
    }

    #[test]
    fn map_keys_sorted_regardless_of_insertion_order() {
        let map1 = Value::Map(vec![
            (text("bb"), Value::Integer(2)),
            (text("a"), Value::Integer(1)),
        ]);
        let map2 = Value::Map(vec![
            (text("a"), Value::Integer(1)),
            (text("bb"), Value::Integer(2)),
        ]);

        let bytes = to_canonical_cbor(&map1).unwrap();
        assert_eq!(bytes, vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]);
        assert_eq!(bytes, to_canonical_cbor(&map2).unwrap());
    }

    #[test]
    fn duplicate_keys_rejected() {
        let map = Value::Map(vec![
            (text("a"), Value::Integer(1)),
            (text("a"), Value::Integer(2)),
        ]);
        assert_eq!(to_canonical_cbor(&map), Err(CodecError::DuplicateKey));
    }

    #[test]
    fn nesting_limit_enforced() {
        let mut value = Value::Null;
        for _ in 0..=MAX_NESTING_DEPTH {
            value = Value::Array(vec![value]);
        }
        assert!(matches!(
            to_canonical_cbor(&value),
            Err(CodecError::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn begin_array_frames_streamed_items() {
        let mut encoder = CanonicalEncoder::with_capacity(8);
        encoder.begin_array(2);
        encoder.encode(&Value::Integer(1)).unwrap();
        encoder.encode(&Value::Null).unwrap();
        assert_eq!(encoder.as_bytes(), &[0x82, 0x01, 0xf6]);
    }
}
