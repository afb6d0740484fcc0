//! Benchmark utilities.

use docingest_core::{Document, DocumentId, Operation, Timestamp};
use rand::Rng;

/// Generate random payload bytes of the specified size.
pub fn random_payload(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// A document with a random payload of `payload_size` bytes.
pub fn document(index: usize, payload_size: usize) -> Document {
    Document::new(DocumentId::keyword(format!("bench/doc-{index}")))
        .with("index", index as i64)
        .with("payload", random_payload(payload_size))
}

/// `count` puts over distinct documents.
pub fn put_operations(count: usize, payload_size: usize) -> Vec<Operation> {
    (0..count)
        .map(|i| Operation::put(document(i, payload_size)))
        .collect()
}

/// A mix of every operation kind, cycling through them.
pub fn mixed_operations(count: usize, payload_size: usize) -> Vec<Operation> {
    (0..count)
        .map(|i| {
            let doc = document(i, payload_size);
            let id = doc.id().clone();
            match i % 6 {
                0 => Operation::put(doc),
                1 => Operation::put_at(doc, Timestamp::from_millis(1_700_000_000_000)),
                2 => Operation::delete(id),
                3 => Operation::matches(id, Some(doc)),
                4 => Operation::cas(None, doc),
                _ => Operation::evict(id),
            }
        })
        .collect()
}
