//! Encode command implementation.

use super::hex;
use crate::ops_json::read_operations;
use crate::Format;
use docingest_core::{ClientConfig, EntryBuilder, LogEntry, Operation};
use serde::Serialize;
use std::path::Path;

/// Summary of an encoded entry.
#[derive(Debug, Serialize)]
pub struct EncodeResult {
    /// SHA-256 of the canonical bytes.
    pub digest: String,
    /// Number of operation elements.
    pub elements: usize,
    /// Number of distinct documents carried.
    pub documents: usize,
    /// Size of the canonical bytes.
    pub size: usize,
    /// Operation keywords in entry order.
    pub kinds: Vec<String>,
    /// Canonical bytes, hex encoded.
    pub hex: String,
}

impl EncodeResult {
    fn from_entry(entry: &LogEntry) -> Self {
        Self {
            digest: entry.digest().to_hex(),
            elements: entry.len(),
            documents: entry.document_count(),
            size: entry.to_bytes().len(),
            kinds: entry.kinds().iter().map(ToString::to_string).collect(),
            hex: hex(entry.to_bytes()),
        }
    }
}

/// Builds an entry under the default client limits.
pub fn encode(ops: &[Operation]) -> Result<LogEntry, Box<dyn std::error::Error>> {
    let config = ClientConfig::default();
    let mut builder = EntryBuilder::new()
        .with_max_operations(config.max_operations_per_entry)
        .allow_empty(config.allow_empty_entries);
    for op in ops {
        builder.push(op)?;
    }
    Ok(builder.finish()?)
}

/// Runs the encode command.
pub fn run(path: &Path, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let ops = read_operations(path)?;
    let entry = encode(&ops)?;
    let result = EncodeResult::from_entry(&entry);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => {
            println!("Digest:    {}", result.digest);
            println!("Elements:  {}", result.elements);
            println!("Documents: {}", result.documents);
            println!("Size:      {} bytes", result.size);
            println!("Kinds:     {}", result.kinds.join(", "));
            println!("Canonical: {}", result.hex);
        }
    }
    Ok(())
}
