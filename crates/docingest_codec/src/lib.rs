//! # docingest codec
//!
//! Canonical CBOR encoding/decoding for docingest log entries.
//!
//! Log collaborators hash and compare entries byte-for-byte, so every
//! value has exactly one encoding:
//!
//! - Maps are sorted by key (length-first, then bytewise on encoded keys)
//! - Duplicate map keys are rejected
//! - Integers, lengths and tags use the shortest head
//! - No floats, no indefinite-length items
//! - Strings must be UTF-8
//!
//! Keywords, UUIDs and timestamps travel as tagged items
//! ([`TAG_KEYWORD`], [`TAG_UUID`], [`TAG_TIMESTAMP_MILLIS`]).
//!
//! ## Usage
//!
//! ```
//! use docingest_codec::{from_cbor, to_canonical_cbor, Value};
//!
//! let value = Value::Array(vec![Value::keyword("tx/evict"), Value::Integer(42)]);
//! let bytes = to_canonical_cbor(&value).unwrap();
//!
//! let decoded = from_cbor(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use value::{Value, TAG_KEYWORD, TAG_TIMESTAMP_MILLIS, TAG_UUID};

/// Maximum nesting of arrays, maps and tags accepted in either direction.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            "[a-z]{0,8}".prop_map(Value::Text),
            prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
            "[a-z]{1,6}/[a-z]{1,6}".prop_map(Value::keyword),
        ]
    }

    proptest! {
        #[test]
        fn map_encoding_ignores_insertion_order(
            entries in prop::collection::btree_map("[a-z]{1,6}", scalar(), 0..8)
        ) {
            let forward: Vec<_> = entries
                .iter()
                .map(|(k, v)| (Value::Text(k.clone()), v.clone()))
                .collect();
            let mut reversed = forward.clone();
            reversed.reverse();

            let a = to_canonical_cbor(&Value::Map(forward)).unwrap();
            let b = to_canonical_cbor(&Value::Map(reversed)).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn decoded_bytes_reencode_identically(items in prop::collection::vec(scalar(), 0..16)) {
            let bytes = Value::Array(items).encode().unwrap();
            let decoded = Value::decode(&bytes).unwrap();
            prop_assert_eq!(decoded.encode().unwrap(), bytes);
        }
    }
}
