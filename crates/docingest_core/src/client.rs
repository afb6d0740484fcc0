//! The submission gateway.
//!
//! [`IngestClient`] turns operation sequences into log entries and hands
//! them to a [`TxLog`]. Both submission modes share one entry-building
//! routine, [`IngestClient::build_entry`], and only diverge at the hand-off:
//!
//! - [`submit`](IngestClient::submit) blocks until the log commits and
//!   returns a [`TxResult`];
//! - [`submit_async`](IngestClient::submit_async) returns a [`DeferredTx`]
//!   as soon as the log has the entry.
//!
//! Encoding failures surface from the call itself in both modes; nothing
//! reaches the log unless every operation encoded.
//!
//! # Ordering
//!
//! An entry reaches the log before its submission call returns, so calls
//! made one after another reach the log in that order, whatever their
//! mode. Asynchronous hand-offs and [`close`](IngestClient::close) are
//! serialized by an internal mutex. A blocking submission never holds it
//! while the log works, so a slow commit does not stall non-blocking
//! submitters or `close` on other threads. Overlapping calls from
//! different threads, and commit order across clients, are up to the log.

use crate::config::ClientConfig;
use crate::document::{Document, DocumentId};
use crate::entry::{EntryBuilder, LogEntry};
use crate::error::{EncodingError, IngestError, IngestResult};
use crate::log::{LogError, TxLog};
use crate::operation::Operation;
use crate::result::{DeferredTx, TxResult};
use crate::stats::{ClientStats, StatsSnapshot};
use crate::types::Timestamp;
use docingest_codec::Value;
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Client for submitting transactions to a log.
///
/// Safe to share between threads; wrap it in an [`Arc`] to do so.
pub struct IngestClient {
    log: Arc<dyn TxLog>,
    config: ClientConfig,
    stats: ClientStats,
    closed: AtomicBool,
    hand_off: Mutex<()>,
}

impl fmt::Debug for IngestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestClient")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl IngestClient {
    /// Creates a client with default configuration.
    pub fn new(log: Arc<dyn TxLog>) -> Self {
        Self::with_config(log, ClientConfig::default())
    }

    /// Creates a client with the given configuration.
    pub fn with_config(log: Arc<dyn TxLog>, config: ClientConfig) -> Self {
        Self {
            log,
            config,
            stats: ClientStats::new(),
            closed: AtomicBool::new(false),
            hand_off: Mutex::new(()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a snapshot of the client's counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Encodes `ops` into a log entry without submitting it.
    ///
    /// Both submission modes go through here.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Encoding`] for the first operation that does
    /// not encode, or if the sequence breaks the configured limits.
    pub fn build_entry<I>(&self, ops: I) -> IngestResult<LogEntry>
    where
        I: IntoIterator,
        I::Item: Borrow<Operation>,
    {
        let mut builder = EntryBuilder::new()
            .with_max_operations(self.config.max_operations_per_entry)
            .allow_empty(self.config.allow_empty_entries);

        for op in ops {
            if let Err(err) = builder.push(op.borrow()) {
                return Err(self.encoding_failed(err));
            }
        }
        let entry = builder.finish().map_err(|err| self.encoding_failed(err))?;

        tracing::debug!(
            ops = entry.len(),
            docs = entry.document_count(),
            bytes = entry.to_bytes().len(),
            digest = %entry.digest(),
            "built log entry"
        );
        Ok(entry)
    }

    /// Submits `ops` and blocks until the log commits them.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Closed`] after [`close`](Self::close), or if the
    ///   client is closed while the log is working on the entry
    /// - [`IngestError::Encoding`] if an operation does not encode; the log
    ///   is not contacted
    /// - [`IngestError::Submission`] if the log rejects the entry or cannot
    ///   be reached
    pub fn submit<I>(&self, ops: I) -> IngestResult<TxResult>
    where
        I: IntoIterator,
        I::Item: Borrow<Operation>,
    {
        self.ensure_open()?;
        let entry = self.build_entry(ops)?;

        self.stats.record_encoded(entry.len(), entry.to_bytes().len());
        self.stats.record_submitted();

        match self.log.submit(&entry) {
            Ok(outcome) => {
                tracing::info!(
                    tx_id = %outcome.tx_id,
                    tx_time = %outcome.tx_time,
                    ops = entry.len(),
                    "entry committed"
                );
                Ok(TxResult::new(outcome, entry.digest()))
            }
            Err(LogError::Closed) if self.is_closed() => {
                self.stats.record_submission_failure();
                tracing::debug!(digest = %entry.digest(), "client closed during submission");
                Err(IngestError::Closed)
            }
            Err(err) => {
                self.stats.record_submission_failure();
                tracing::warn!(digest = %entry.digest(), error = %err, "submission failed");
                Err(err.into())
            }
        }
    }

    /// Submits `ops` without waiting for the commit.
    ///
    /// Encoding happens before this returns. A log that refuses the
    /// hand-off yields a handle that is already failed, so log failures are
    /// always observed through the handle.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Closed`] after [`close`](Self::close)
    /// - [`IngestError::Encoding`] if an operation does not encode
    /// - [`IngestError::Unsupported`] if the log has no asynchronous path
    pub fn submit_async<I>(&self, ops: I) -> IngestResult<DeferredTx>
    where
        I: IntoIterator,
        I::Item: Borrow<Operation>,
    {
        self.ensure_open()?;
        let entry = self.build_entry(ops)?;
        let digest = entry.digest();

        let _hand_off = self.hand_off.lock();
        self.ensure_open()?;
        self.stats.record_encoded(entry.len(), entry.to_bytes().len());
        self.stats.record_submitted_async();

        match self.log.submit_async(entry) {
            Ok(handle) => {
                tracing::debug!(%digest, "entry handed off");
                Ok(DeferredTx::new(handle, digest, self.config.await_timeout))
            }
            Err(LogError::Unsupported { capability }) => {
                self.stats.record_submission_failure();
                Err(IngestError::Unsupported { capability })
            }
            Err(err) => {
                self.stats.record_submission_failure();
                tracing::warn!(%digest, error = %err, "hand-off failed");
                Ok(DeferredTx::failed(err, digest))
            }
        }
    }

    /// Starts a fluent transaction.
    pub fn transaction(&self) -> TxBuilder<'_> {
        TxBuilder {
            client: self,
            ops: Vec::new(),
        }
    }

    /// Closes the client and the log connection.
    ///
    /// Waits for an in-flight asynchronous hand-off, but not for blocking
    /// submissions; those see [`IngestError::Closed`] if the log shuts
    /// under them. Idempotent: only the first call reaches the log.
    ///
    /// # Errors
    ///
    /// Returns the log's error if closing the connection fails; the client
    /// is closed regardless.
    pub fn close(&self) -> IngestResult<()> {
        let _hand_off = self.hand_off.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::info!(stats = ?self.stats.snapshot(), "closing ingest client");
        self.log.close().map_err(IngestError::from)
    }

    fn ensure_open(&self) -> IngestResult<()> {
        if self.is_closed() {
            Err(IngestError::Closed)
        } else {
            Ok(())
        }
    }

    fn encoding_failed(&self, err: EncodingError) -> IngestError {
        self.stats.record_encoding_failure();
        tracing::warn!(error = %err, "operation encoding failed");
        err.into()
    }
}

/// Accumulates operations for one transaction.
///
/// Nothing is encoded until [`submit`](Self::submit) or
/// [`submit_async`](Self::submit_async).
#[derive(Debug)]
#[must_use = "a transaction does nothing until submitted"]
pub struct TxBuilder<'a> {
    client: &'a IngestClient,
    ops: Vec<Operation>,
}

impl TxBuilder<'_> {
    /// Appends an operation.
    pub fn push(mut self, op: Operation) -> Self {
        self.ops.push(op);
        self
    }

    /// Appends a put.
    pub fn put(self, doc: Document) -> Self {
        self.push(Operation::put(doc))
    }

    /// Appends a put valid from `valid_time`.
    pub fn put_at(self, doc: Document, valid_time: Timestamp) -> Self {
        self.push(Operation::put_at(doc, valid_time))
    }

    /// Appends a delete.
    pub fn delete(self, id: DocumentId) -> Self {
        self.push(Operation::delete(id))
    }

    /// Appends a delete effective from `valid_time`.
    pub fn delete_at(self, id: DocumentId, valid_time: Timestamp) -> Self {
        self.push(Operation::delete_at(id, valid_time))
    }

    /// Appends a match.
    pub fn matches(self, id: DocumentId, expected: Option<Document>) -> Self {
        self.push(Operation::matches(id, expected))
    }

    /// Appends a compare-and-swap.
    pub fn cas(self, old: Option<Document>, new: Document) -> Self {
        self.push(Operation::cas(old, new))
    }

    /// Appends an eviction.
    pub fn evict(self, id: DocumentId) -> Self {
        self.push(Operation::evict(id))
    }

    /// Appends a transaction function call.
    pub fn call(self, id: DocumentId, args: Vec<Value>) -> Self {
        self.push(Operation::call(id, args))
    }

    /// Operations accumulated so far.
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    /// Submits and blocks. See [`IngestClient::submit`].
    ///
    /// # Errors
    ///
    /// As [`IngestClient::submit`].
    pub fn submit(self) -> IngestResult<TxResult> {
        self.client.submit(self.ops)
    }

    /// Submits without blocking. See [`IngestClient::submit_async`].
    ///
    /// # Errors
    ///
    /// As [`IngestClient::submit_async`].
    pub fn submit_async(self) -> IngestResult<DeferredTx> {
        self.client.submit_async(self.ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EncodingFailure, SubmissionError};
    use crate::memory_log::{EmptyEntryPolicy, InMemoryLogConfig, InMemoryTxLog};
    use crate::operation::OpKind;
    use crate::result::DeferredStatus;
    use crate::types::TxId;

    fn doc(name: &str, n: i64) -> Document {
        Document::new(DocumentId::keyword(name)).with("n", n)
    }

    fn client() -> (Arc<InMemoryTxLog>, IngestClient) {
        let log = Arc::new(InMemoryTxLog::new());
        let client = IngestClient::new(log.clone());
        (log, client)
    }

    #[test]
    fn blocking_submit_commits() {
        let (log, client) = client();
        let before = Timestamp::now();
        let result = client
            .submit([
                Operation::put(doc("k/a", 1)),
                Operation::delete(DocumentId::keyword("k/b")),
            ])
            .unwrap();

        assert_eq!(result.tx_id(), TxId::new(1));
        assert!(result.tx_time() >= before);
        assert_eq!(log.committed()[0].entry.kinds(), vec![OpKind::Put, OpKind::Delete]);
        assert_eq!(log.committed()[0].entry.digest(), result.digest());
    }

    #[test]
    fn empty_submission_commits() {
        let (log, client) = client();
        let before = Timestamp::now();
        let result = client.submit(Vec::<Operation>::new()).unwrap();
        assert!(result.tx_time() >= before);
        assert!(log.committed()[0].entry.is_empty());
    }

    #[test]
    fn empty_submission_refused_by_config() {
        let log = Arc::new(InMemoryTxLog::new());
        let client = IngestClient::with_config(
            log.clone(),
            ClientConfig::new().allow_empty_entries(false),
        );
        let err = client.submit(Vec::<Operation>::new()).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Encoding(EncodingError {
                reason: EncodingFailure::EmptyEntry,
                ..
            })
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn empty_submission_rejected_by_log() {
        let log = Arc::new(InMemoryTxLog::with_config(
            InMemoryLogConfig::new().empty_entry_policy(EmptyEntryPolicy::Reject),
        ));
        let client = IngestClient::new(log);
        assert!(matches!(
            client.submit(Vec::<Operation>::new()),
            Err(IngestError::Submission(SubmissionError::Rejected { .. }))
        ));
        assert_eq!(client.stats().submission_failures, 1);
    }

    #[test]
    fn encoding_failure_never_reaches_log() {
        let (log, client) = client();
        let ops = vec![
            Operation::put(doc("k/a", 1)),
            Operation::evict(DocumentId::keyword("")),
        ];

        let err = client.submit(&ops).unwrap_err();
        assert!(err.is_encoding());
        let err = client.submit_async(&ops).unwrap_err();
        assert!(err.is_encoding());

        assert!(log.is_empty());
        let stats = client.stats();
        assert_eq!(stats.encoding_failures, 2);
        assert_eq!(stats.total_entries(), 0);
    }

    #[test]
    fn async_submit_resolves() {
        let (_log, client) = client();
        let deferred = client.submit_async([Operation::put(doc("k/a", 1))]).unwrap();
        let outcome = deferred.wait().unwrap();
        assert_eq!(outcome.tx_id, TxId::new(1));
        assert_eq!(deferred.status(), DeferredStatus::Resolved);
        assert_eq!(client.stats().entries_submitted_async, 1);
    }

    #[test]
    fn both_modes_encode_identically() {
        let (log, client) = client();
        let ops = vec![Operation::put(doc("k/a", 1)), Operation::evict(DocumentId::keyword("k/b"))];

        client.submit(&ops).unwrap();
        client.submit_async(&ops).unwrap().wait().unwrap();

        let committed = log.committed();
        assert_eq!(committed[0].entry, committed[1].entry);
    }

    #[test]
    fn submit_after_close_fails() {
        let (log, client) = client();
        client.close().unwrap();
        client.close().unwrap();

        assert!(client.is_closed());
        assert!(log.is_closed());
        assert_eq!(client.submit([Operation::put(doc("k/a", 1))]), Err(IngestError::Closed));
        assert!(matches!(
            client.submit_async(Vec::<Operation>::new()),
            Err(IngestError::Closed)
        ));
    }

    #[test]
    fn async_hand_off_to_closed_log_fails_the_handle() {
        let (log, client) = client();
        log.close().unwrap();
        let deferred = client.submit_async(Vec::<Operation>::new()).unwrap();
        assert_eq!(deferred.status(), DeferredStatus::Failed);
        assert_eq!(
            deferred.wait(),
            Err(IngestError::Submission(SubmissionError::LogClosed))
        );
    }

    #[test]
    fn transaction_builder() {
        let (log, client) = client();
        let tx = client
            .transaction()
            .put(doc("k/a", 1))
            .put_at(doc("k/a", 2), Timestamp::from_millis(5))
            .matches(DocumentId::keyword("k/b"), None)
            .cas(Some(doc("k/a", 2)), doc("k/a", 3))
            .delete_at(DocumentId::keyword("k/a"), Timestamp::from_millis(9))
            .evict(DocumentId::keyword("k/c"))
            .call(DocumentId::keyword("fn/noop"), vec![]);
        assert_eq!(tx.operations().len(), 7);

        tx.submit().unwrap();
        assert_eq!(
            log.committed()[0].entry.kinds(),
            vec![
                OpKind::Put,
                OpKind::Put,
                OpKind::Match,
                OpKind::Cas,
                OpKind::Delete,
                OpKind::Evict,
                OpKind::Fn
            ]
        );

        client
            .transaction()
            .delete(DocumentId::keyword("k/a"))
            .submit_async()
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn max_operations_from_config() {
        let log = Arc::new(InMemoryTxLog::new());
        let client =
            IngestClient::with_config(log, ClientConfig::new().max_operations_per_entry(1));
        let err = client
            .submit([
                Operation::evict(DocumentId::Integer(1)),
                Operation::evict(DocumentId::Integer(2)),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Encoding(EncodingError {
                index: Some(1),
                reason: EncodingFailure::TooManyOperations { .. },
                ..
            })
        ));
    }

    #[test]
    fn stats_track_bytes() {
        let (_log, client) = client();
        let entry = client.build_entry([Operation::put(doc("k/a", 1))]).unwrap();
        client.submit([Operation::put(doc("k/a", 1))]).unwrap();
        let stats = client.stats();
        assert_eq!(stats.operations_encoded, 1);
        assert_eq!(stats.bytes_encoded, entry.to_bytes().len() as u64);
    }
}
