//! Error types for the ingest client.

use crate::log::LogError;
use crate::operation::OpKind;
use docingest_codec::CodecError;
use std::time::Duration;
use thiserror::Error;

/// Result type for client operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors surfaced to callers of the ingest client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// An operation could not be translated to its canonical element.
    ///
    /// Always raised before anything reaches the log.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// The log rejected the entry or could not be reached.
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// A submission was attempted after [`close`](crate::IngestClient::close).
    #[error("client is closed")]
    Closed,

    /// The log collaborator does not offer the requested capability.
    #[error("unsupported operation: {capability}")]
    Unsupported {
        /// Name of the missing capability.
        capability: &'static str,
    },
}

impl IngestError {
    /// Returns true for encoding failures.
    #[must_use]
    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }

    /// Returns true for submission failures.
    #[must_use]
    pub fn is_submission(&self) -> bool {
        matches!(self, Self::Submission(_))
    }

    /// Returns true if the client was already closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl From<LogError> for IngestError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::Unsupported { capability } => Self::Unsupported { capability },
            other => Self::Submission(SubmissionError::from(other)),
        }
    }
}

/// An operation (or the sequence as a whole) failed to encode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot encode {}: {reason}", describe_target(.index, .kind))]
pub struct EncodingError {
    /// Index of the offending operation in the submitted sequence, if the
    /// failure belongs to a single operation.
    pub index: Option<usize>,
    /// Kind of the offending operation.
    pub kind: Option<OpKind>,
    /// What was wrong.
    pub reason: EncodingFailure,
}

impl EncodingError {
    /// Failure attributed to a single operation of `kind`.
    #[must_use]
    pub fn operation(kind: OpKind, reason: EncodingFailure) -> Self {
        Self {
            index: None,
            kind: Some(kind),
            reason,
        }
    }

    /// Failure of the sequence as a whole.
    #[must_use]
    pub fn entry(reason: EncodingFailure) -> Self {
        Self {
            index: None,
            kind: None,
            reason,
        }
    }

    /// Records the position of the offending operation.
    #[must_use]
    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

fn describe_target(index: &Option<usize>, kind: &Option<OpKind>) -> String {
    match (index, kind) {
        (Some(pos), Some(kind)) => format!("operation #{pos} ({kind})"),
        (None, Some(kind)) => format!("{kind} operation"),
        (Some(pos), None) => format!("operation #{pos}"),
        (None, None) => "entry".to_string(),
    }
}

/// Reasons an operation or entry cannot be encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingFailure {
    /// A keyword or text id is empty.
    #[error("document id is empty")]
    EmptyId,

    /// A keyword id contains whitespace.
    #[error("keyword id {0:?} contains whitespace")]
    MalformedKeyword(String),

    /// Transaction functions are addressed by keyword only.
    #[error("transaction function id must be a keyword, got {0}")]
    FnIdNotKeyword(String),

    /// An end of valid time was given without a start.
    #[error("end valid time given without a start valid time")]
    EndWithoutStart,

    /// The valid-time range is empty or inverted.
    #[error("end valid time {end}ms is not after start {start}ms")]
    InvalidValidTimeRange {
        /// Start of the range in epoch milliseconds.
        start: i64,
        /// End of the range in epoch milliseconds.
        end: i64,
    },

    /// Two documents in one operation name different entities.
    #[error("document id mismatch: expected {expected}, found {found}")]
    IdMismatch {
        /// Id the operation targets.
        expected: String,
        /// Id carried by the offending document.
        found: String,
    },

    /// A document field uses a reserved namespace.
    #[error("field {0:?} uses a reserved prefix")]
    ReservedField(String),

    /// A value could not be written as canonical CBOR.
    #[error("canonical encoding failed: {0}")]
    Codec(#[from] CodecError),

    /// The client is configured to refuse empty entries.
    #[error("entry contains no operations")]
    EmptyEntry,

    /// The sequence exceeds the configured entry size.
    #[error("{count} operations exceed the limit of {max}")]
    TooManyOperations {
        /// Operations submitted.
        count: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// The log did not commit the entry.
///
/// Terminal for the submission that produced it: nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// The log refused the entry.
    #[error("log rejected entry: {reason}")]
    Rejected {
        /// Reason given by the log.
        reason: String,
    },

    /// The log connection is unavailable.
    #[error("log connection unavailable: {reason}")]
    ConnectionUnavailable {
        /// Description of the failure.
        reason: String,
    },

    /// The log reported that the commit timed out.
    #[error("log timed out before committing the entry")]
    LogTimedOut,

    /// A caller-side wait elapsed before the log resolved the entry.
    ///
    /// The deferred result stays pending and may be awaited again.
    #[error("no outcome after waiting {waited:?}")]
    AwaitTimedOut {
        /// How long the caller waited.
        waited: Duration,
    },

    /// The submission was cancelled before it committed.
    #[error("submission cancelled")]
    Cancelled,

    /// The log was closed before the entry committed.
    #[error("log closed")]
    LogClosed,
}

impl SubmissionError {
    /// Returns true for log-side and caller-side timeouts.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::LogTimedOut | Self::AwaitTimedOut { .. })
    }
}

impl From<LogError> for SubmissionError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::Rejected { reason } => Self::Rejected { reason },
            LogError::Unavailable { reason } => Self::ConnectionUnavailable { reason },
            LogError::TimedOut => Self::LogTimedOut,
            LogError::Cancelled => Self::Cancelled,
            LogError::Closed => Self::LogClosed,
            LogError::Unsupported { capability } => Self::Rejected {
                reason: format!("log does not support {capability}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_error_names_the_operation() {
        let err = EncodingError::operation(OpKind::Put, EncodingFailure::EmptyId).at(3);
        assert_eq!(err.to_string(), "cannot encode operation #3 (tx/put): document id is empty");

        let err = EncodingError::entry(EncodingFailure::EmptyEntry);
        assert_eq!(err.to_string(), "cannot encode entry: entry contains no operations");
    }

    #[test]
    fn log_errors_map_onto_taxonomy() {
        assert_eq!(
            IngestError::from(LogError::Unsupported { capability: "cancel" }),
            IngestError::Unsupported { capability: "cancel" }
        );
        assert_eq!(
            IngestError::from(LogError::TimedOut),
            IngestError::Submission(SubmissionError::LogTimedOut)
        );
        assert!(IngestError::from(LogError::Closed).is_submission());
    }

    #[test]
    fn timeouts() {
        assert!(SubmissionError::LogTimedOut.is_timeout());
        assert!(SubmissionError::AwaitTimedOut {
            waited: Duration::from_millis(5)
        }
        .is_timeout());
        assert!(!SubmissionError::Cancelled.is_timeout());
    }
}
