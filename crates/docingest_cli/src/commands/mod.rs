//! CLI command implementations.

pub mod encode;
pub mod submit;

use std::fmt::Write;

/// Lowercase hex rendering of `bytes`.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
