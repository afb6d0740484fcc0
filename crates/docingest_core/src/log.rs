//! The log collaborator seam.
//!
//! The ingest client does not store anything itself. It hands finished
//! [`LogEntry`] values to a [`TxLog`] and adapts whatever the log returns.
//! Implementations must be safe to call from several threads at once:
//! one client is shared by every thread that submits through it.

use crate::entry::LogEntry;
use crate::result::CommitOutcome;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for log collaborator calls.
pub type LogResult<T> = Result<T, LogError>;

/// Failures reported by a log collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// The log refused the entry.
    #[error("rejected: {reason}")]
    Rejected {
        /// Reason given by the log.
        reason: String,
    },

    /// The log cannot be reached.
    #[error("unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },

    /// The log gave up before committing.
    #[error("timed out")]
    TimedOut,

    /// The submission was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// The collaborator lacks the requested capability.
    #[error("unsupported: {capability}")]
    Unsupported {
        /// Name of the capability.
        capability: &'static str,
    },

    /// The log has been closed.
    #[error("closed")]
    Closed,
}

impl LogError {
    /// Creates a rejection error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates an unavailability error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// A transaction log that accepts entries and assigns commit outcomes.
pub trait TxLog: Send + Sync {
    /// Submits `entry` and blocks until the log commits or refuses it.
    fn submit(&self, entry: &LogEntry) -> LogResult<CommitOutcome>;

    /// Hands `entry` to the log and returns at once.
    ///
    /// An error here means the hand-off itself failed; commit failures are
    /// reported through the returned handle.
    fn submit_async(&self, entry: LogEntry) -> LogResult<Box<dyn CommitHandle>>;

    /// Releases the connection. Calling it twice is not required to succeed.
    fn close(&self) -> LogResult<()>;
}

/// A log's promise to resolve one submitted entry.
pub trait CommitHandle: Send + Sync + fmt::Debug {
    /// Returns the outcome if it is already known.
    fn try_outcome(&self) -> Option<LogResult<CommitOutcome>>;

    /// Blocks until the outcome is known or `timeout` elapses.
    ///
    /// `None` waits without bound. Returns `None` only when the timeout
    /// elapsed first.
    fn wait(&self, timeout: Option<Duration>) -> Option<LogResult<CommitOutcome>>;

    /// Whether [`cancel`](Self::cancel) is implemented.
    fn supports_cancel(&self) -> bool {
        false
    }

    /// Asks the log to abandon the entry.
    ///
    /// Returns `Ok(true)` if the entry will not commit, `Ok(false)` if it
    /// had already resolved.
    fn cancel(&self) -> LogResult<bool> {
        Err(LogError::Unsupported {
            capability: "cancel",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed;

    impl CommitHandle for Fixed {
        fn try_outcome(&self) -> Option<LogResult<CommitOutcome>> {
            Some(Err(LogError::TimedOut))
        }

        fn wait(&self, _timeout: Option<Duration>) -> Option<LogResult<CommitOutcome>> {
            self.try_outcome()
        }
    }

    #[test]
    fn cancel_is_unsupported_by_default() {
        let handle = Fixed;
        assert!(!handle.supports_cancel());
        assert_eq!(
            handle.cancel(),
            Err(LogError::Unsupported {
                capability: "cancel"
            })
        );
    }

    #[test]
    fn constructors() {
        assert_eq!(
            LogError::rejected("bad").to_string(),
            "rejected: bad"
        );
        assert_eq!(
            LogError::unavailable("down"),
            LogError::Unavailable {
                reason: "down".into()
            }
        );
    }
}
