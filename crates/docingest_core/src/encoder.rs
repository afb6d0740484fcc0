//! Operation encoder.
//!
//! Maps one [`Operation`] to its canonical log element:
//!
//! | Kind | Element |
//! |------|---------|
//! | put | `[tx/put, id, doc-hash, valid-time?, end-valid-time?]` |
//! | delete | `[tx/delete, id, valid-time?, end-valid-time?]` |
//! | match | `[tx/match, id, doc-hash \| null, valid-time?]` |
//! | cas | `[tx/cas, id, old-hash \| null, new-hash, valid-time?]` |
//! | evict | `[tx/evict, id]` |
//! | fn | `[tx/fn, fn-id, [args...]]` |
//!
//! Documents are referenced by the SHA-256 of their canonical bytes. The
//! bodies travel next to the element in [`EncodedOp::documents`] and end up
//! in the entry's document table. Absent trailing times are omitted rather
//! than written as null.
//!
//! Encoding is pure: it looks at nothing but the operation itself.

use crate::document::{Document, DocumentId};
use crate::error::{EncodingError, EncodingFailure};
use crate::operation::{OpKind, Operation};
use crate::types::{ContentHash, Timestamp};
use docingest_codec::{to_canonical_cbor, Value};

/// A document body and the hash the element refers to it by.
pub type DocumentRef = (ContentHash, Value);

/// The canonical form of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedOp {
    /// Kind of the source operation.
    pub kind: OpKind,
    /// The log element.
    pub element: Value,
    /// Documents referenced by `element`.
    pub documents: Vec<DocumentRef>,
}

/// Encodes one operation.
///
/// # Errors
///
/// Returns an [`EncodingError`] (without an index) if the operation is
/// malformed or carries a value with no canonical encoding.
pub fn encode_operation(op: &Operation) -> Result<EncodedOp, EncodingError> {
    let kind = op.kind();
    encode_inner(op)
        .map(|(element, documents)| EncodedOp {
            kind,
            element,
            documents,
        })
        .map_err(|reason| EncodingError::operation(kind, reason))
}

fn encode_inner(op: &Operation) -> Result<(Value, Vec<DocumentRef>), EncodingFailure> {
    let mut documents = Vec::new();
    let mut items = vec![Value::keyword(op.kind().keyword())];

    match op {
        Operation::Put {
            doc,
            valid_time,
            end_valid_time,
        } => {
            let (hash, body) = encode_document(doc)?;
            items.push(doc.id().to_value());
            items.push(hash_value(&hash));
            documents.push((hash, body));
            push_valid_time(&mut items, *valid_time, *end_valid_time)?;
        }
        Operation::Delete {
            id,
            valid_time,
            end_valid_time,
        } => {
            id.validate()?;
            items.push(id.to_value());
            push_valid_time(&mut items, *valid_time, *end_valid_time)?;
        }
        Operation::Match {
            id,
            expected,
            valid_time,
        } => {
            id.validate()?;
            items.push(id.to_value());
            match expected {
                Some(doc) => {
                    check_same_entity(id, doc)?;
                    let (hash, body) = encode_document(doc)?;
                    items.push(hash_value(&hash));
                    documents.push((hash, body));
                }
                None => items.push(Value::Null),
            }
            push_valid_time(&mut items, *valid_time, None)?;
        }
        Operation::Cas {
            old,
            new,
            valid_time,
        } => {
            let (new_hash, new_body) = encode_document(new)?;
            items.push(new.id().to_value());
            match old {
                Some(old) => {
                    check_same_entity(new.id(), old)?;
                    let (hash, body) = encode_document(old)?;
                    items.push(hash_value(&hash));
                    documents.push((hash, body));
                }
                None => items.push(Value::Null),
            }
            items.push(hash_value(&new_hash));
            documents.push((new_hash, new_body));
            push_valid_time(&mut items, *valid_time, None)?;
        }
        Operation::Evict { id } => {
            id.validate()?;
            items.push(id.to_value());
        }
        Operation::Fn { id, args } => {
            if !id.is_keyword() {
                return Err(EncodingFailure::FnIdNotKeyword(id.to_string()));
            }
            id.validate()?;
            items.push(id.to_value());
            items.push(Value::Array(args.clone()));
        }
    }

    let element = Value::Array(items);
    // Arguments are caller-supplied values; prove they have a canonical form.
    to_canonical_cbor(&element)?;
    Ok((element, documents))
}

/// Validates a document and returns its hash and canonical body.
fn encode_document(doc: &Document) -> Result<DocumentRef, EncodingFailure> {
    doc.validate()?;
    let body = doc.to_value();
    let bytes = to_canonical_cbor(&body)?;
    Ok((ContentHash::of(&bytes), body))
}

fn check_same_entity(expected: &DocumentId, doc: &Document) -> Result<(), EncodingFailure> {
    if doc.id() == expected {
        Ok(())
    } else {
        Err(EncodingFailure::IdMismatch {
            expected: expected.to_string(),
            found: doc.id().to_string(),
        })
    }
}

fn hash_value(hash: &ContentHash) -> Value {
    Value::Bytes(hash.as_bytes().to_vec())
}

fn push_valid_time(
    items: &mut Vec<Value>,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
) -> Result<(), EncodingFailure> {
    match (start, end) {
        (None, None) => {}
        (None, Some(_)) => return Err(EncodingFailure::EndWithoutStart),
        (Some(start), None) => items.push(Value::timestamp_millis(start.as_millis())),
        (Some(start), Some(end)) => {
            if end <= start {
                return Err(EncodingFailure::InvalidValidTimeRange {
                    start: start.as_millis(),
                    end: end.as_millis(),
                });
            }
            items.push(Value::timestamp_millis(start.as_millis()));
            items.push(Value::timestamp_millis(end.as_millis()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docingest_codec::CodecError;

    fn alice() -> DocumentId {
        DocumentId::keyword("user/alice")
    }

    fn alice_doc(age: i64) -> Document {
        Document::new(alice()).with("name", "Alice").with("age", age)
    }

    fn items(encoded: &EncodedOp) -> &[Value] {
        encoded.element.as_array().unwrap()
    }

    #[test]
    fn put_references_document_by_hash() {
        let encoded = encode_operation(&Operation::put(alice_doc(30))).unwrap();
        let items = items(&encoded);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_keyword(), Some("tx/put"));
        assert_eq!(items[1], Value::keyword("user/alice"));

        let (hash, body) = &encoded.documents[0];
        assert_eq!(items[2].as_bytes(), Some(&hash.as_bytes()[..]));
        assert_eq!(*hash, ContentHash::of(&to_canonical_cbor(body).unwrap()));
    }

    #[test]
    fn encoding_is_idempotent() {
        let op = Operation::put_during(
            alice_doc(30),
            Timestamp::from_millis(1_000),
            Timestamp::from_millis(2_000),
        );
        assert_eq!(encode_operation(&op).unwrap(), encode_operation(&op).unwrap());
    }

    #[test]
    fn field_insertion_order_does_not_change_hash() {
        let a = Document::new(alice()).with("name", "Alice").with("age", 30i64);
        let b = Document::new(alice()).with("age", 30i64).with("name", "Alice");
        let ea = encode_operation(&Operation::put(a)).unwrap();
        let eb = encode_operation(&Operation::put(b)).unwrap();
        assert_eq!(ea.element, eb.element);
    }

    #[test]
    fn valid_times_are_trailing_and_optional() {
        let encoded = encode_operation(&Operation::delete_at(
            alice(),
            Timestamp::from_millis(5),
        ))
        .unwrap();
        let items = items(&encoded);
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].as_timestamp_millis(), Some(5));
        assert!(encoded.documents.is_empty());
    }

    #[test]
    fn end_without_start_rejected() {
        let op = Operation::Delete {
            id: alice(),
            valid_time: None,
            end_valid_time: Some(Timestamp::from_millis(5)),
        };
        let err = encode_operation(&op).unwrap_err();
        assert_eq!(err.kind, Some(OpKind::Delete));
        assert_eq!(err.reason, EncodingFailure::EndWithoutStart);
    }

    #[test]
    fn inverted_range_rejected() {
        let op = Operation::put_during(
            alice_doc(1),
            Timestamp::from_millis(10),
            Timestamp::from_millis(10),
        );
        assert!(matches!(
            encode_operation(&op).unwrap_err().reason,
            EncodingFailure::InvalidValidTimeRange { start: 10, end: 10 }
        ));
    }

    #[test]
    fn match_absent_encodes_null() {
        let encoded = encode_operation(&Operation::matches(alice(), None)).unwrap();
        assert_eq!(items(&encoded)[2], Value::Null);
        assert!(encoded.documents.is_empty());
    }

    #[test]
    fn match_with_foreign_document_rejected() {
        let bob = Document::new(DocumentId::keyword("user/bob"));
        let err = encode_operation(&Operation::matches(alice(), Some(bob))).unwrap_err();
        assert!(matches!(err.reason, EncodingFailure::IdMismatch { .. }));
    }

    #[test]
    fn cas_carries_both_hashes() {
        let encoded =
            encode_operation(&Operation::cas(Some(alice_doc(30)), alice_doc(31))).unwrap();
        let items = items(&encoded);
        assert_eq!(items.len(), 4);
        assert_eq!(encoded.documents.len(), 2);
        assert_eq!(items[2].as_bytes(), Some(&encoded.documents[0].0.as_bytes()[..]));
        assert_eq!(items[3].as_bytes(), Some(&encoded.documents[1].0.as_bytes()[..]));
    }

    #[test]
    fn cas_across_entities_rejected() {
        let bob = Document::new(DocumentId::keyword("user/bob"));
        let err = encode_operation(&Operation::cas(Some(bob), alice_doc(1))).unwrap_err();
        assert_eq!(err.kind, Some(OpKind::Cas));
        assert!(matches!(err.reason, EncodingFailure::IdMismatch { .. }));
    }

    #[test]
    fn evict_and_empty_id() {
        let encoded = encode_operation(&Operation::evict(alice())).unwrap();
        assert_eq!(items(&encoded).len(), 2);

        let err = encode_operation(&Operation::evict(DocumentId::keyword(""))).unwrap_err();
        assert_eq!(err.reason, EncodingFailure::EmptyId);
    }

    #[test]
    fn fn_requires_keyword_id() {
        let ok = encode_operation(&Operation::call(
            DocumentId::keyword("fn/incr"),
            vec![Value::keyword("user/alice"), Value::Integer(1)],
        ))
        .unwrap();
        assert_eq!(items(&ok)[2].as_array().map(<[Value]>::len), Some(2));

        let err =
            encode_operation(&Operation::call(DocumentId::Integer(1), vec![])).unwrap_err();
        assert!(matches!(err.reason, EncodingFailure::FnIdNotKeyword(_)));
    }

    #[test]
    fn unencodable_argument_rejected() {
        let bad = Value::Map(vec![
            (Value::from("a"), Value::Integer(1)),
            (Value::from("a"), Value::Integer(2)),
        ]);
        let err =
            encode_operation(&Operation::call(DocumentId::keyword("fn/x"), vec![bad])).unwrap_err();
        assert_eq!(err.reason, EncodingFailure::Codec(CodecError::DuplicateKey));
    }

    #[test]
    fn reserved_field_rejected() {
        let doc = Document::new(alice()).with("tx/id", 1i64);
        let err = encode_operation(&Operation::put(doc)).unwrap_err();
        assert_eq!(err.reason, EncodingFailure::ReservedField("tx/id".into()));
    }
}
