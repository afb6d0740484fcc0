//! Client statistics.
//!
//! Counters are updated by the submission gateway and can be read while
//! submissions are in flight.
//!
//! # Usage
//!
//! ```rust
//! use docingest_core::{IngestClient, InMemoryTxLog, Operation, DocumentId};
//! use std::sync::Arc;
//!
//! let client = IngestClient::new(Arc::new(InMemoryTxLog::new()));
//! client.submit([Operation::evict(DocumentId::keyword("user/alice"))]).unwrap();
//!
//! let stats = client.stats();
//! assert_eq!(stats.entries_submitted, 1);
//! assert_eq!(stats.operations_encoded, 1);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Submission counters for one client.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct ClientStats {
    /// Entries handed to the log through the blocking path.
    entries_submitted: AtomicU64,
    /// Entries handed to the log through the non-blocking path.
    entries_submitted_async: AtomicU64,
    /// Operations successfully encoded into entries.
    operations_encoded: AtomicU64,
    /// Submissions aborted because an operation failed to encode.
    encoding_failures: AtomicU64,
    /// Submissions the log rejected or could not accept.
    submission_failures: AtomicU64,
    /// Canonical bytes of all entries handed to the log.
    bytes_encoded: AtomicU64,
}

impl ClientStats {
    /// Creates a zeroed stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_encoded(&self, operations: usize, bytes: usize) {
        self.operations_encoded
            .fetch_add(operations as u64, Ordering::Relaxed);
        self.bytes_encoded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_submitted(&self) {
        self.entries_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_submitted_async(&self) {
        self.entries_submitted_async.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_encoding_failure(&self) {
        self.encoding_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_submission_failure(&self) {
        self.submission_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of entries submitted in blocking mode.
    pub fn entries_submitted(&self) -> u64 {
        self.entries_submitted.load(Ordering::Relaxed)
    }

    /// Returns the number of entries submitted in non-blocking mode.
    pub fn entries_submitted_async(&self) -> u64 {
        self.entries_submitted_async.load(Ordering::Relaxed)
    }

    /// Returns the number of operations encoded.
    pub fn operations_encoded(&self) -> u64 {
        self.operations_encoded.load(Ordering::Relaxed)
    }

    /// Returns the number of submissions aborted by an encoding failure.
    pub fn encoding_failures(&self) -> u64 {
        self.encoding_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of failed hand-offs and blocking commits.
    ///
    /// Failures reported later through a deferred handle are not counted.
    pub fn submission_failures(&self) -> u64 {
        self.submission_failures.load(Ordering::Relaxed)
    }

    /// Returns the total canonical bytes encoded.
    pub fn bytes_encoded(&self) -> u64 {
        self.bytes_encoded.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            entries_submitted: self.entries_submitted(),
            entries_submitted_async: self.entries_submitted_async(),
            operations_encoded: self.operations_encoded(),
            encoding_failures: self.encoding_failures(),
            submission_failures: self.submission_failures(),
            bytes_encoded: self.bytes_encoded(),
        }
    }
}

/// A point-in-time copy of [`ClientStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Entries submitted in blocking mode.
    pub entries_submitted: u64,
    /// Entries submitted in non-blocking mode.
    pub entries_submitted_async: u64,
    /// Operations encoded.
    pub operations_encoded: u64,
    /// Submissions aborted by an encoding failure.
    pub encoding_failures: u64,
    /// Failed hand-offs and blocking commits.
    pub submission_failures: u64,
    /// Canonical bytes encoded.
    pub bytes_encoded: u64,
}

impl StatsSnapshot {
    /// Entries handed to the log in either mode.
    pub fn total_entries(&self) -> u64 {
        self.entries_submitted + self.entries_submitted_async
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stats_are_zero() {
        assert_eq!(ClientStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn counters_accumulate() {
        let stats = ClientStats::new();
        stats.record_encoded(3, 120);
        stats.record_encoded(2, 80);
        stats.record_submitted();
        stats.record_submitted_async();
        stats.record_submitted_async();
        stats.record_encoding_failure();
        stats.record_submission_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.operations_encoded, 5);
        assert_eq!(snap.bytes_encoded, 200);
        assert_eq!(snap.entries_submitted, 1);
        assert_eq!(snap.entries_submitted_async, 2);
        assert_eq!(snap.total_entries(), 3);
        assert_eq!(snap.encoding_failures, 1);
        assert_eq!(snap.submission_failures, 1);
    }

    #[test]
    fn stats_are_thread_safe() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(ClientStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..250 {
                        stats.record_submitted();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.entries_submitted(), 1000);
    }
}
