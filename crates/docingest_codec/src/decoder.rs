//! Validating canonical CBOR decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use crate::MAX_NESTING_DEPTH;
use std::cmp::Ordering;

/// Maximum element count accepted for arrays and maps.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum byte/text string length accepted.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

/// Decode exactly one value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not canonical CBOR, contain
/// forbidden constructs (floats, indefinite lengths, unsorted keys), or
/// carry trailing bytes after the value.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// A canonical CBOR decoder.
///
/// Rejects anything the [`CanonicalEncoder`](crate::CanonicalEncoder)
/// would not have produced, so decoding then re-encoding is byte-stable.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        self.read_value(0)
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    fn read_value(&mut self, depth: usize) -> CodecResult<Value> {
        if depth > MAX_NESTING_DEPTH {
            return Err(CodecError::NestingTooDeep {
                max_depth: MAX_NESTING_DEPTH,
            });
        }

        let initial = self.read_byte()?;
        let major_type = initial >> 5;
        let info = initial & 0x1f;

        if major_type == 7 {
            return Self::simple_value(info);
        }
        if info == 31 {
            return Err(CodecError::IndefiniteLengthForbidden);
        }
        let arg = self.read_arg(info)?;

        match major_type {
            0 => i64::try_from(arg)
                .map(Value::Integer)
                .map_err(|_| CodecError::IntegerOverflow),
            1 => i64::try_from(arg)
                .map(|n| Value::Integer(-1 - n))
                .map_err(|_| CodecError::IntegerOverflow),
            2 => {
                let len = Self::check_len(arg, MAX_BYTES_LENGTH)?;
                Ok(Value::Bytes(self.read_slice(len)?.to_vec()))
            }
            3 => {
                let len = Self::check_len(arg, MAX_BYTES_LENGTH)?;
                let text = std::str::from_utf8(self.read_slice(len)?)
                    .map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Text(text.to_string()))
            }
            4 => {
                let len = Self::check_len(arg, MAX_CONTAINER_ELEMENTS)?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.read_value(depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            5 => self.read_map(arg, depth),
            6 => Ok(Value::Tagged(arg, Box::new(self.read_value(depth + 1)?))),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    fn read_map(&mut self, arg: u64, depth: usize) -> CodecResult<Value> {
        let len = Self::check_len(arg, MAX_CONTAINER_ELEMENTS)?;
        let mut pairs = Vec::with_capacity(len.min(1024));
        let mut prev_key: Option<&'a [u8]> = None;

        for _ in 0..len {
            let key_start = self.pos;
            let key = self.read_value(depth + 1)?;
            let data: &'a [u8] = self.data;
            let key_bytes = &data[key_start..self.pos];

            if let Some(prev) = prev_key {
                match compare_encoded(prev, key_bytes) {
                    Ordering::Less => {}
                    Ordering::Equal => return Err(CodecError::DuplicateKey),
                    Ordering::Greater => {
                        return Err(CodecError::invalid_structure(
                            "non-canonical: map keys not in sorted order",
                        ))
                    }
                }
            }
            prev_key = Some(key_bytes);

            let value = self.read_value(depth + 1)?;
            pairs.push((key, value));
        }

        Ok(Value::Map(pairs))
    }

    fn simple_value(info: u8) -> CodecResult<Value> {
        match info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            25..=27 => Err(CodecError::FloatForbidden),
            31 => Err(CodecError::invalid_structure("break without indefinite item")),
            other => Err(CodecError::unsupported_type(format!("simple value {other}"))),
        }
    }

    fn check_len(arg: u64, max: u64) -> CodecResult<usize> {
        if arg > max {
            return Err(CodecError::SizeLimitExceeded {
                claimed: arg,
                max_allowed: max,
            });
        }
        usize::try_from(arg).map_err(|_| CodecError::IntegerOverflow)
    }

    /// Reads a head argument, rejecting any non-shortest form.
    fn read_arg(&mut self, info: u8) -> CodecResult<u64> {
        let (value, min) = match info {
            0..=23 => return Ok(u64::from(info)),
            24 => (u64::from(self.read_byte()?), 24),
            25 => {
                let b = self.read_slice(2)?;
                (u64::from(u16::from_be_bytes([b[0], b[1]])), 0x100)
            }
            26 => {
                let b = self.read_slice(4)?;
                (u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]])), 0x1_0000)
            }
            27 => {
                let b = self.read_slice(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                (u64::from_be_bytes(raw), 0x1_0000_0000)
            }
            _ => return Err(CodecError::invalid_structure("reserved additional info")),
        };

        if value < min {
            return Err(CodecError::invalid_structure(
                "non-canonical: value could be encoded in fewer bytes",
            ));
        }
        Ok(value)
    }

    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_slice(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let slice = self.data.get(self.pos..end).ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }
}

/// Length-first, then bytewise.
fn compare_encoded(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
