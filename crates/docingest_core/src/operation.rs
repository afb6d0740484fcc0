//! Transaction operations.
//!
//! An [`Operation`] is one mutation intent. A transaction is an ordered
//! sequence of them; later operations may override earlier ones on the
//! same entity, so order is preserved all the way to the log.

use crate::document::{Document, DocumentId};
use crate::types::Timestamp;
use docingest_codec::Value;
use std::fmt;

/// The kind of an operation, named by its log keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Write a document version.
    Put,
    /// End an entity's current version.
    Delete,
    /// Assert an entity's current version.
    Match,
    /// Compare-and-swap a document version.
    Cas,
    /// Remove an entity's entire history.
    Evict,
    /// Invoke a stored transaction function.
    Fn,
}

impl OpKind {
    /// All kinds, in declaration order.
    pub const ALL: [OpKind; 6] = [
        Self::Put,
        Self::Delete,
        Self::Match,
        Self::Cas,
        Self::Evict,
        Self::Fn,
    ];

    /// The keyword that heads this kind's log element.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Put => "tx/put",
            Self::Delete => "tx/delete",
            Self::Match => "tx/match",
            Self::Cas => "tx/cas",
            Self::Evict => "tx/evict",
            Self::Fn => "tx/fn",
        }
    }

    /// Looks a kind up by its keyword.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.keyword() == keyword)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One mutation intent within a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Write `doc` as the entity's version from `valid_time` (default: commit
    /// time) until `end_valid_time` (default: open-ended).
    Put {
        /// Document to write.
        doc: Document,
        /// Start of validity.
        valid_time: Option<Timestamp>,
        /// End of validity, exclusive.
        end_valid_time: Option<Timestamp>,
    },
    /// End the entity's version over the given validity range.
    Delete {
        /// Entity to delete.
        id: DocumentId,
        /// Start of the deletion.
        valid_time: Option<Timestamp>,
        /// End of the deletion, exclusive.
        end_valid_time: Option<Timestamp>,
    },
    /// Abort the transaction unless the entity's version equals `expected`.
    ///
    /// `None` asserts that the entity has no version.
    Match {
        /// Entity to check.
        id: DocumentId,
        /// Expected version.
        expected: Option<Document>,
        /// Instant at which to check.
        valid_time: Option<Timestamp>,
    },
    /// Replace `old` with `new`, aborting the transaction if `old` is not
    /// the current version.
    Cas {
        /// Expected current version; `None` expects no version.
        old: Option<Document>,
        /// Replacement version.
        new: Document,
        /// Instant at which to swap.
        valid_time: Option<Timestamp>,
    },
    /// Remove every version of the entity.
    Evict {
        /// Entity to evict.
        id: DocumentId,
    },
    /// Invoke the stored transaction function `id` with `args`.
    Fn {
        /// Keyword naming the function.
        id: DocumentId,
        /// Arguments.
        args: Vec<Value>,
    },
}

impl Operation {
    /// Writes `doc` as of commit time.
    pub fn put(doc: Document) -> Self {
        Self::Put {
            doc,
            valid_time: None,
            end_valid_time: None,
        }
    }

    /// Writes `doc` valid from `valid_time`.
    pub fn put_at(doc: Document, valid_time: Timestamp) -> Self {
        Self::Put {
            doc,
            valid_time: Some(valid_time),
            end_valid_time: None,
        }
    }

    /// Writes `doc` valid over `[start, end)`.
    pub fn put_during(doc: Document, start: Timestamp, end: Timestamp) -> Self {
        Self::Put {
            doc,
            valid_time: Some(start),
            end_valid_time: Some(end),
        }
    }

    /// Deletes `id` as of commit time.
    pub fn delete(id: DocumentId) -> Self {
        Self::Delete {
            id,
            valid_time: None,
            end_valid_time: None,
        }
    }

    /// Deletes `id` from `valid_time`.
    pub fn delete_at(id: DocumentId, valid_time: Timestamp) -> Self {
        Self::Delete {
            id,
            valid_time: Some(valid_time),
            end_valid_time: None,
        }
    }

    /// Asserts the current version of `id`.
    pub fn matches(id: DocumentId, expected: Option<Document>) -> Self {
        Self::Match {
            id,
            expected,
            valid_time: None,
        }
    }

    /// Compare-and-swap as of commit time.
    pub fn cas(old: Option<Document>, new: Document) -> Self {
        Self::Cas {
            old,
            new,
            valid_time: None,
        }
    }

    /// Evicts `id`.
    pub fn evict(id: DocumentId) -> Self {
        Self::Evict { id }
    }

    /// Calls the transaction function `id`.
    pub fn call(id: DocumentId, args: Vec<Value>) -> Self {
        Self::Fn { id, args }
    }

    /// Returns the kind of this operation.
    #[must_use]
    pub fn kind(&self) -> OpKind {
        match self {
            Self::Put { .. } => OpKind::Put,
            Self::Delete { .. } => OpKind::Delete,
            Self::Match { .. } => OpKind::Match,
            Self::Cas { .. } => OpKind::Cas,
            Self::Evict { .. } => OpKind::Evict,
            Self::Fn { .. } => OpKind::Fn,
        }
    }

    /// Returns the entity this operation targets.
    #[must_use]
    pub fn target(&self) -> &DocumentId {
        match self {
            Self::Put { doc, .. } => doc.id(),
            Self::Cas { new, .. } => new.id(),
            Self::Delete { id, .. }
            | Self::Match { id, .. }
            | Self::Evict { id }
            | Self::Fn { id, .. } => id,
        }
    }
}
