//! Property-based test generators using proptest.
//!
//! Valid strategies only produce operations that encode; the invalid
//! strategy only produces operations that must not.

use docingest_codec::Value;
use docingest_core::{Document, DocumentId, Operation, Timestamp};
use proptest::prelude::*;
use uuid::Uuid;

/// Strategy for generating well-formed document ids.
pub fn document_id_strategy() -> impl Strategy<Value = DocumentId> {
    prop_oneof![
        "[a-z]{1,8}/[a-z]{1,8}".prop_map(DocumentId::Keyword),
        "[a-z0-9]{1,12}".prop_map(DocumentId::Text),
        prop::array::uniform16(any::<u8>()).prop_map(|b| DocumentId::Uuid(Uuid::from_bytes(b))),
        any::<i64>().prop_map(DocumentId::Integer),
    ]
}

/// Strategy for generating field names outside the reserved namespaces.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,10}"
}

/// Strategy for generating float-free values, nested up to three levels.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        "[a-z]{1,6}/[a-z]{1,6}".prop_map(Value::keyword),
        any::<i64>().prop_map(Value::timestamp_millis),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(|m| {
                Value::map(m.into_iter().map(|(k, v)| (Value::Text(k), v)).collect())
            }),
        ]
    })
}

/// Strategy for generating a document with the given id.
pub fn document_for(id: DocumentId) -> impl Strategy<Value = Document> {
    prop::collection::btree_map(field_name_strategy(), value_strategy(), 0..6).prop_map(
        move |fields| {
            fields
                .into_iter()
                .fold(Document::new(id.clone()), |doc, (k, v)| doc.with(k, v))
        },
    )
}

/// Strategy for generating documents.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    document_id_strategy().prop_flat_map(document_for)
}

/// Strategy for generating valid-time instants.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (0i64..4_000_000_000_000).prop_map(Timestamp::from_millis)
}

/// Strategy for generating a `[start, end)` range with `start < end`.
pub fn valid_range_strategy() -> impl Strategy<Value = (Timestamp, Timestamp)> {
    (0i64..4_000_000_000_000, 1i64..1_000_000).prop_map(|(start, len)| {
        (
            Timestamp::from_millis(start),
            Timestamp::from_millis(start + len),
        )
    })
}

/// Strategy for generating operations that encode.
pub fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        document_strategy().prop_map(Operation::put),
        (document_strategy(), timestamp_strategy()).prop_map(|(d, t)| Operation::put_at(d, t)),
        (document_strategy(), valid_range_strategy())
            .prop_map(|(d, (s, e))| Operation::put_during(d, s, e)),
        document_id_strategy().prop_map(Operation::delete),
        (document_id_strategy(), timestamp_strategy())
            .prop_map(|(id, t)| Operation::delete_at(id, t)),
        document_id_strategy().prop_flat_map(|id| {
            prop::option::of(document_for(id.clone()))
                .prop_map(move |expected| Operation::matches(id.clone(), expected))
        }),
        document_id_strategy().prop_flat_map(|id| {
            (prop::option::of(document_for(id.clone())), document_for(id))
                .prop_map(|(old, new)| Operation::cas(old, new))
        }),
        document_id_strategy().prop_map(Operation::evict),
        (
            "[a-z]{1,6}/[a-z]{1,6}",
            prop::collection::vec(value_strategy(), 0..4)
        )
            .prop_map(|(name, args)| Operation::call(DocumentId::Keyword(name), args)),
    ]
}

/// Strategy for generating operations that never encode.
pub fn invalid_operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::evict(DocumentId::keyword(""))),
        Just(Operation::put(Document::new(DocumentId::text("")))),
        document_strategy().prop_map(|d| Operation::put(d.with("db/id", 1i64))),
        document_strategy().prop_map(|d| Operation::put(d.with("tx/note", "reserved"))),
        (document_id_strategy(), timestamp_strategy()).prop_map(|(id, t)| Operation::Delete {
            id,
            valid_time: None,
            end_valid_time: Some(t),
        }),
        (document_strategy(), timestamp_strategy())
            .prop_map(|(d, t)| Operation::put_during(d, t, t)),
        any::<i64>().prop_map(|n| Operation::call(DocumentId::Integer(n), vec![])),
        (document_strategy(), document_strategy())
            .prop_filter("ids must differ", |(a, b)| a.id() != b.id())
            .prop_map(|(old, new)| Operation::cas(Some(old), new)),
    ]
}

/// Strategy for generating sequences of valid operations.
pub fn operations_strategy(max_len: usize) -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec(operation_strategy(), 0..=max_len)
}
