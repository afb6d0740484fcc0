//! Client fixtures and sample data.

use crate::recording::RecordingLog;
use docingest_core::{ClientConfig, Document, DocumentId, InMemoryTxLog, IngestClient, Operation};
use std::sync::Arc;

/// A client over a fresh [`RecordingLog`].
pub fn recording_client() -> (Arc<RecordingLog>, IngestClient) {
    recording_client_with(RecordingLog::new(), ClientConfig::default())
}

/// A client over the given log and configuration.
pub fn recording_client_with(
    log: RecordingLog,
    config: ClientConfig,
) -> (Arc<RecordingLog>, IngestClient) {
    let log = Arc::new(log);
    let client = IngestClient::with_config(log.clone(), config);
    (log, client)
}

/// A client over a fresh [`InMemoryTxLog`].
pub fn memory_client() -> (Arc<InMemoryTxLog>, IngestClient) {
    let log = Arc::new(InMemoryTxLog::new());
    let client = IngestClient::new(log.clone());
    (log, client)
}

/// A keyword-identified document with a single `value` field.
pub fn sample_document(key: &str, value: i64) -> Document {
    Document::new(DocumentId::keyword(key)).with("value", value)
}

/// `Put(key = value)`.
pub fn put(key: &str, value: i64) -> Operation {
    Operation::put(sample_document(key, value))
}

/// `Delete(key)`.
pub fn delete(key: &str) -> Operation {
    Operation::delete(DocumentId::keyword(key))
}

/// An operation that always fails to encode.
pub fn malformed() -> Operation {
    Operation::evict(DocumentId::keyword(""))
}
