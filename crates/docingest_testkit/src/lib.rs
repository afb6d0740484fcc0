//! # docingest testkit
//!
//! Test utilities for docingest.
//!
//! This crate provides:
//! - [`RecordingLog`], a log collaborator that records every entry in
//!   hand-off order and can inject rejections, outages, timeouts and
//!   never-resolving handles
//! - Property-based test generators using proptest
//! - Fixtures for common client setups
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```
//! use docingest_testkit::prelude::*;
//! use docingest_core::{DocumentId, Operation};
//!
//! let (log, client) = recording_client();
//! client.submit([Operation::evict(DocumentId::keyword("user/alice"))]).unwrap();
//! assert_eq!(log.received().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod recording;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recording::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use recording::*;
pub use stress::*;
