//! # docingest core
//!
//! Transaction-ingest client for a document log.
//!
//! This crate provides:
//! - An operation model (put, delete, match, cas, evict, fn) and its
//!   canonical log encoding
//! - An entry builder that keeps caller order and fails fast
//! - A submission gateway with blocking and non-blocking modes
//! - Synchronous results and deferred handles with wait, poll and cancel
//! - The [`TxLog`] seam, a one-shot resolution primitive and an in-memory
//!   reference log
//!
//! ## Usage
//!
//! ```
//! use docingest_core::{Document, DocumentId, InMemoryTxLog, IngestClient, Operation};
//! use std::sync::Arc;
//!
//! let client = IngestClient::new(Arc::new(InMemoryTxLog::new()));
//!
//! let alice = Document::new(DocumentId::keyword("user/alice")).with("name", "Alice");
//! let result = client.submit([Operation::put(alice)]).unwrap();
//! println!("committed as {}", result.tx_id());
//!
//! let deferred = client
//!     .submit_async([Operation::delete(DocumentId::keyword("user/alice"))])
//!     .unwrap();
//! let outcome = deferred.wait().unwrap();
//! assert!(outcome.tx_id > result.tx_id());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod document;
mod encoder;
mod entry;
mod error;
mod log;
mod memory_log;
mod operation;
pub mod resolution;
mod result;
mod stats;
mod types;

pub use client::{IngestClient, TxBuilder};
pub use config::{ClientConfig, DEFAULT_MAX_OPERATIONS};
pub use document::{Document, DocumentId, ID_FIELD, RESERVED_PREFIXES};
pub use encoder::{encode_operation, DocumentRef, EncodedOp};
pub use entry::{element_kind, EntryBuilder, LogEntry};
pub use error::{EncodingError, EncodingFailure, IngestError, IngestResult, SubmissionError};
pub use log::{CommitHandle, LogError, LogResult, TxLog};
pub use memory_log::{CommittedEntry, EmptyEntryPolicy, InMemoryLogConfig, InMemoryTxLog};
pub use operation::{OpKind, Operation};
pub use result::{CommitOutcome, DeferredStatus, DeferredTx, TxResult};
pub use stats::{ClientStats, StatsSnapshot};
pub use types::{ContentHash, Timestamp, TxId};

pub use docingest_codec::Value;
