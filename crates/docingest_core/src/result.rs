//! Result model: synchronous results and deferred handles.

use crate::error::{IngestError, IngestResult, SubmissionError};
use crate::log::{CommitHandle, LogError, LogResult};
use crate::resolution::Resolution;
use crate::types::{ContentHash, Timestamp, TxId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The identity and time the log assigned to a committed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitOutcome {
    /// Transaction id.
    pub tx_id: TxId,
    /// Commit time.
    pub tx_time: Timestamp,
}

impl CommitOutcome {
    /// Creates an outcome.
    #[must_use]
    pub const fn new(tx_id: TxId, tx_time: Timestamp) -> Self {
        Self { tx_id, tx_time }
    }
}

impl fmt::Display for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.tx_id, self.tx_time)
    }
}

/// Result of a blocking submission. Already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxResult {
    outcome: CommitOutcome,
    digest: ContentHash,
}

impl TxResult {
    pub(crate) fn new(outcome: CommitOutcome, digest: ContentHash) -> Self {
        Self { outcome, digest }
    }

    /// Transaction id assigned by the log.
    pub fn tx_id(&self) -> TxId {
        self.outcome.tx_id
    }

    /// Commit time assigned by the log.
    pub fn tx_time(&self) -> Timestamp {
        self.outcome.tx_time
    }

    /// The full outcome.
    pub fn outcome(&self) -> CommitOutcome {
        self.outcome
    }

    /// Digest of the committed entry.
    pub fn digest(&self) -> ContentHash {
        self.digest
    }
}

/// Observable state of a [`DeferredTx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeferredStatus {
    /// The log has not resolved the entry yet.
    Pending,
    /// The entry committed.
    Resolved,
    /// The entry will never commit.
    Failed,
}

#[derive(Debug, Clone)]
enum DeferredState {
    Pending,
    Resolved(CommitOutcome),
    Failed(SubmissionError),
}

/// Handle to an entry submitted without blocking.
///
/// Moves from pending to resolved or failed exactly once; the terminal
/// state is cached, so later calls never consult the log again.
#[derive(Debug)]
pub struct DeferredTx {
    handle: Arc<dyn CommitHandle>,
    state: Mutex<DeferredState>,
    await_timeout: Option<Duration>,
    digest: ContentHash,
}

impl DeferredTx {
    pub(crate) fn new(
        handle: Box<dyn CommitHandle>,
        digest: ContentHash,
        await_timeout: Option<Duration>,
    ) -> Self {
        Self {
            handle: Arc::from(handle),
            state: Mutex::new(DeferredState::Pending),
            await_timeout,
            digest,
        }
    }

    /// A handle whose hand-off already failed.
    pub(crate) fn failed(err: LogError, digest: ContentHash) -> Self {
        Self::new(Box::new(Resolution::resolved(Err(err))), digest, None)
    }

    /// Digest of the submitted entry.
    pub fn digest(&self) -> ContentHash {
        self.digest
    }

    /// Current state, checking the log without blocking.
    pub fn status(&self) -> DeferredStatus {
        // Errors are reflected in the status; poll reports them.
        let _ = self.poll();
        match *self.state.lock() {
            DeferredState::Pending => DeferredStatus::Pending,
            DeferredState::Resolved(_) => DeferredStatus::Resolved,
            DeferredState::Failed(_) => DeferredStatus::Failed,
        }
    }

    /// Returns the outcome if the log has resolved the entry.
    ///
    /// Never blocks. `Ok(None)` means still pending.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Submission`] once the entry has failed.
    pub fn poll(&self) -> IngestResult<Option<CommitOutcome>> {
        if let Some(done) = self.terminal() {
            return done.map(Some);
        }
        match self.handle.try_outcome() {
            Some(result) => self.settle(result).map(Some),
            None => Ok(None),
        }
    }

    /// Blocks until the entry resolves, bounded by the client's
    /// `await_timeout` if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Submission`] if the log fails the entry, or
    /// [`SubmissionError::AwaitTimedOut`] if the bound elapses first. In the
    /// latter case the handle stays pending.
    pub fn wait(&self) -> IngestResult<CommitOutcome> {
        self.wait_for(self.await_timeout)
    }

    /// Blocks for at most `timeout`.
    ///
    /// # Errors
    ///
    /// As [`wait`](Self::wait).
    pub fn wait_timeout(&self, timeout: Duration) -> IngestResult<CommitOutcome> {
        self.wait_for(Some(timeout))
    }

    /// Whether the log supports cancelling this entry.
    pub fn supports_cancel(&self) -> bool {
        self.handle.supports_cancel()
    }

    /// Asks the log to abandon the entry.
    ///
    /// Returns `Ok(true)` if the entry is now failed with
    /// [`SubmissionError::Cancelled`], `Ok(false)` if it had already
    /// resolved either way.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Unsupported`] when the log cannot cancel.
    pub fn cancel(&self) -> IngestResult<bool> {
        if !self.handle.supports_cancel() {
            return Err(IngestError::Unsupported {
                capability: "cancel",
            });
        }
        if self.terminal().is_some() {
            return Ok(false);
        }

        if self.handle.cancel()? {
            let _ = self.settle(Err(LogError::Cancelled));
            tracing::debug!(digest = %self.digest, "deferred entry cancelled");
            Ok(true)
        } else {
            let _ = self.poll();
            Ok(false)
        }
    }

    /// Waits on a blocking-pool thread, for tokio callers.
    ///
    /// # Errors
    ///
    /// As [`wait`](Self::wait).
    pub async fn resolve_async(self) -> IngestResult<CommitOutcome> {
        match tokio::task::spawn_blocking(move || self.wait()).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(SubmissionError::Cancelled.into()),
        }
    }

    fn wait_for(&self, timeout: Option<Duration>) -> IngestResult<CommitOutcome> {
        if let Some(done) = self.terminal() {
            return done;
        }
        // The state lock is not held while blocked.
        match self.handle.wait(timeout) {
            Some(result) => self.settle(result),
            None => Err(SubmissionError::AwaitTimedOut {
                waited: timeout.unwrap_or_default(),
            }
            .into()),
        }
    }

    fn terminal(&self) -> Option<IngestResult<CommitOutcome>> {
        match &*self.state.lock() {
            DeferredState::Pending => None,
            DeferredState::Resolved(outcome) => Some(Ok(*outcome)),
            DeferredState::Failed(err) => Some(Err(err.clone().into())),
        }
    }

    /// Records the first terminal result and returns whichever result won.
    fn settle(&self, result: LogResult<CommitOutcome>) -> IngestResult<CommitOutcome> {
        let mut state = self.state.lock();
        if let DeferredState::Pending = *state {
            *state = match result {
                Ok(outcome) => {
                    tracing::trace!(digest = %self.digest, %outcome, "deferred entry resolved");
                    DeferredState::Resolved(outcome)
                }
                Err(err) => {
                    tracing::trace!(digest = %self.digest, error = %err, "deferred entry failed");
                    DeferredState::Failed(SubmissionError::from(err))
                }
            };
        }
        match &*state {
            DeferredState::Resolved(outcome) => Ok(*outcome),
            DeferredState::Failed(err) => Err(err.clone().into()),
            DeferredState::Pending => Err(SubmissionError::LogClosed.into()),
        }
    }
}
