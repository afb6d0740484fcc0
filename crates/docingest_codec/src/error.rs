//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode value to CBOR.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Float values are forbidden in canonical CBOR.
    #[error("float values are forbidden in canonical CBOR")]
    FloatForbidden,

    /// Indefinite-length items are forbidden.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Bytes remained after the top-level item was decoded.
    #[error("{remaining} trailing bytes after top-level item")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        remaining: usize,
    },

    /// Invalid CBOR structure.
    #[error("invalid CBOR structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// Unsupported CBOR type.
    #[error("unsupported CBOR type: {type_name}")]
    UnsupportedType {
        /// Name of the unsupported type.
        type_name: String,
    },

    /// Integer does not fit in the i64 range.
    #[error("integer overflow")]
    IntegerOverflow,

    /// A map contains the same key twice.
    #[error("duplicate map key")]
    DuplicateKey,

    /// Arrays, maps and tags are nested deeper than the codec allows.
    #[error("nesting depth exceeds {max_depth}")]
    NestingTooDeep {
        /// Maximum supported depth.
        max_depth: usize,
    },

    /// A length prefix claims more elements or bytes than allowed.
    #[error("size limit exceeded: claimed {claimed}, max {max_allowed}")]
    SizeLimitExceeded {
        /// Length claimed by the input.
        claimed: u64,
        /// Maximum length accepted.
        max_allowed: u64,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }
}
