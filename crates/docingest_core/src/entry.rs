//! Log entries and the entry builder.
//!
//! A [`LogEntry`] is the unit handed to the log: the ordered elements of
//! one transaction plus a table of the documents they reference. Its
//! canonical bytes are `{"docs": {hash: body, ...}, "ops": [element, ...]}`
//! and are computed once, when the builder finishes.

use crate::encoder::encode_operation;
use crate::error::{EncodingError, EncodingFailure};
use crate::operation::{OpKind, Operation};
use crate::types::ContentHash;
use docingest_codec::{
    from_cbor, to_canonical_cbor, CodecError, CodecResult, Value, TAG_KEYWORD, TAG_UUID,
};
use std::collections::BTreeMap;

const DOCS_KEY: &str = "docs";
const OPS_KEY: &str = "ops";

/// One transaction, canonically encoded.
///
/// Immutable once built. Element order is the order the operations were
/// supplied in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    elements: Vec<Value>,
    documents: BTreeMap<ContentHash, Value>,
    bytes: Vec<u8>,
    digest: ContentHash,
}

impl LogEntry {
    /// Encodes `ops` into an entry with no size or emptiness limits.
    ///
    /// # Errors
    ///
    /// Fails on the first operation that cannot be encoded.
    pub fn from_operations<'a>(
        ops: impl IntoIterator<Item = &'a Operation>,
    ) -> Result<Self, EncodingError> {
        let mut builder = EntryBuilder::new();
        for op in ops {
            builder.push(op)?;
        }
        builder.finish()
    }

    /// Parses canonical entry bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not canonical CBOR, do not have the
    /// entry shape, name an unknown operation, hold an element of the wrong
    /// arity or argument types for its kind, reference a document the table
    /// lacks, or carry a document whose hash does not match its body.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let value = from_cbor(bytes)?;
        let pairs = value
            .as_map()
            .ok_or_else(|| CodecError::invalid_structure("entry is not a map"))?;
        if pairs.len() != 2 {
            return Err(CodecError::invalid_structure("entry must have docs and ops"));
        }

        let docs = value
            .get(DOCS_KEY)
            .and_then(Value::as_map)
            .ok_or_else(|| CodecError::invalid_structure("missing docs table"))?;
        let ops = value
            .get(OPS_KEY)
            .and_then(Value::as_array)
            .ok_or_else(|| CodecError::invalid_structure("missing ops array"))?;

        let mut documents = BTreeMap::new();
        for (key, body) in docs {
            let hash = key
                .as_bytes()
                .and_then(ContentHash::from_slice)
                .ok_or_else(|| CodecError::invalid_structure("document key is not a hash"))?;
            if ContentHash::of(&to_canonical_cbor(body)?) != hash {
                return Err(CodecError::invalid_structure(format!(
                    "document {hash} does not match its hash"
                )));
            }
            documents.insert(hash, body.clone());
        }

        for element in ops {
            let kind = element_kind(element)
                .ok_or_else(|| CodecError::invalid_structure("unknown operation element"))?;
            check_shape(kind, element)?;
            for hash in referenced_hashes(kind, element) {
                if !documents.contains_key(&hash) {
                    return Err(CodecError::invalid_structure(format!(
                        "{kind} references missing document {hash}"
                    )));
                }
            }
        }

        Ok(Self {
            elements: ops.to_vec(),
            documents,
            bytes: bytes.to_vec(),
            digest: ContentHash::of(bytes),
        })
    }

    /// The encoded elements, in submission order.
    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    /// The kinds of the elements, in submission order.
    pub fn kinds(&self) -> Vec<OpKind> {
        self.elements.iter().filter_map(element_kind).collect()
    }

    /// Looks up a referenced document body.
    pub fn document(&self, hash: &ContentHash) -> Option<&Value> {
        self.documents.get(hash)
    }

    /// Number of distinct documents carried.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if the entry holds no operations.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Canonical bytes of the entry.
    pub fn to_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// SHA-256 of [`to_bytes`](Self::to_bytes).
    pub fn digest(&self) -> ContentHash {
        self.digest
    }
}

/// Reads the kind keyword heading an element.
pub fn element_kind(element: &Value) -> Option<OpKind> {
    element
        .as_array()?
        .first()?
        .as_keyword()
        .and_then(OpKind::from_keyword)
}

/// What may sit at one position of an element.
#[derive(Clone, Copy)]
enum Slot {
    Id,
    Hash,
    HashOrNull,
    Time,
    Args,
}

impl Slot {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Id => is_document_id(value),
            Self::Hash => value.as_bytes().and_then(ContentHash::from_slice).is_some(),
            Self::HashOrNull => value.is_null() || Self::Hash.accepts(value),
            Self::Time => value.as_timestamp_millis().is_some(),
            Self::Args => value.as_array().is_some(),
        }
    }
}

fn is_document_id(value: &Value) -> bool {
    match value {
        Value::Text(id) => !id.is_empty(),
        Value::Integer(_) => true,
        Value::Tagged(TAG_KEYWORD, inner) => inner.as_text().is_some_and(|name| !name.is_empty()),
        Value::Tagged(TAG_UUID, inner) => inner.as_bytes().is_some_and(|b| b.len() == 16),
        _ => false,
    }
}

/// Checks the arguments after the kind keyword: `required` slots, then up
/// to `optional.len()` trailing ones.
fn check_shape(kind: OpKind, element: &Value) -> CodecResult<()> {
    use Slot::{Args, Hash, HashOrNull, Id, Time};

    let (required, optional): (&[Slot], &[Slot]) = match kind {
        OpKind::Put => (&[Id, Hash], &[Time, Time]),
        OpKind::Delete => (&[Id], &[Time, Time]),
        OpKind::Match => (&[Id, HashOrNull], &[Time]),
        OpKind::Cas => (&[Id, HashOrNull, Hash], &[Time]),
        OpKind::Evict => (&[Id], &[]),
        OpKind::Fn => (&[Id, Args], &[]),
    };
    let args = element.as_array().unwrap_or_default().get(1..).unwrap_or_default();
    if args.len() < required.len() || args.len() > required.len() + optional.len() {
        return Err(CodecError::invalid_structure(format!(
            "{kind} element has {} arguments",
            args.len()
        )));
    }
    let slots = required.iter().chain(optional);
    for (position, (slot, value)) in slots.zip(args).enumerate() {
        if !slot.accepts(value) {
            return Err(CodecError::invalid_structure(format!(
                "{kind} element has a bad argument at position {}",
                position + 1
            )));
        }
    }
    Ok(())
}

fn referenced_hashes(kind: OpKind, element: &Value) -> Vec<ContentHash> {
    let positions: &[usize] = match kind {
        OpKind::Put | OpKind::Match => &[2],
        OpKind::Cas => &[2, 3],
        OpKind::Delete | OpKind::Evict | OpKind::Fn => &[],
    };
    let items = element.as_array().unwrap_or_default();
    positions
        .iter()
        .filter_map(|&i| items.get(i)?.as_bytes())
        .filter_map(ContentHash::from_slice)
        .collect()
}

/// Accumulates encoded operations into a [`LogEntry`].
///
/// Fail-fast: the first operation that does not encode poisons nothing but
/// is reported immediately, and the caller is expected to drop the builder.
#[derive(Debug)]
pub struct EntryBuilder {
    elements: Vec<Value>,
    documents: BTreeMap<ContentHash, Value>,
    max_operations: usize,
    allow_empty: bool,
}

impl Default for EntryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryBuilder {
    /// Creates a builder with no limits.
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            documents: BTreeMap::new(),
            max_operations: usize::MAX,
            allow_empty: true,
        }
    }

    /// Caps the number of operations.
    #[must_use]
    pub fn with_max_operations(mut self, max: usize) -> Self {
        self.max_operations = max;
        self
    }

    /// Sets whether [`finish`](Self::finish) accepts zero operations.
    #[must_use]
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    /// Number of operations pushed so far.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Encodes `op` and appends it.
    ///
    /// # Errors
    ///
    /// Returns the operation's [`EncodingError`], tagged with its index, or
    /// `TooManyOperations` once the cap is exceeded.
    pub fn push(&mut self, op: &Operation) -> Result<&mut Self, EncodingError> {
        let index = self.elements.len();
        if index >= self.max_operations {
            return Err(EncodingError::operation(
                op.kind(),
                EncodingFailure::TooManyOperations {
                    count: index + 1,
                    max: self.max_operations,
                },
            )
            .at(index));
        }

        let encoded = encode_operation(op).map_err(|e| e.at(index))?;
        self.elements.push(encoded.element);
        self.documents.extend(encoded.documents);
        Ok(self)
    }

    /// Finishes the entry and computes its canonical bytes.
    ///
    /// # Errors
    ///
    /// Fails if the entry is empty and empty entries are not allowed.
    pub fn finish(self) -> Result<LogEntry, EncodingError> {
        if self.elements.is_empty() && !self.allow_empty {
            return Err(EncodingError::entry(EncodingFailure::EmptyEntry));
        }

        let docs = self
            .documents
            .iter()
            .map(|(hash, body)| (Value::Bytes(hash.as_bytes().to_vec()), body.clone()))
            .collect();
        let value = Value::map(vec![
            (Value::from(DOCS_KEY), Value::Map(docs)),
            (Value::from(OPS_KEY), Value::Array(self.elements.clone())),
        ]);
        let bytes = to_canonical_cbor(&value)
            .map_err(|e| EncodingError::entry(EncodingFailure::Codec(e)))?;

        Ok(LogEntry {
            digest: ContentHash::of(&bytes),
            elements: self.elements,
            documents: self.documents,
            bytes,
        })
    }
}
