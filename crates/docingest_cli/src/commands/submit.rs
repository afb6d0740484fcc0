//! Submit command implementation.

use crate::ops_json::read_operations;
use crate::Format;
use docingest_core::{
    CommitOutcome, InMemoryTxLog, IngestClient, IngestResult, Operation, StatsSnapshot,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Outcome of the submit command.
#[derive(Debug, Serialize)]
pub struct SubmitReport {
    /// Whether the non-blocking path was used.
    pub mode: &'static str,
    /// One outcome per submission, in order.
    pub outcomes: Vec<CommitOutcome>,
    /// Client counters after closing.
    pub stats: StatsSnapshot,
}

/// Submits `ops` `repeat` times against a fresh in-memory log.
///
/// In async mode every entry is handed off before any handle is awaited.
pub fn submit(ops: &[Operation], use_async: bool, repeat: usize) -> IngestResult<SubmitReport> {
    let client = IngestClient::new(Arc::new(InMemoryTxLog::new()));

    let outcomes = if use_async {
        let handles = (0..repeat)
            .map(|_| client.submit_async(ops))
            .collect::<IngestResult<Vec<_>>>()?;
        handles
            .iter()
            .map(|h| h.wait())
            .collect::<IngestResult<Vec<_>>>()?
    } else {
        (0..repeat)
            .map(|_| client.submit(ops).map(|r| r.outcome()))
            .collect::<IngestResult<Vec<_>>>()?
    };

    client.close()?;
    Ok(SubmitReport {
        mode: if use_async { "async" } else { "blocking" },
        outcomes,
        stats: client.stats(),
    })
}

/// Runs the submit command.
pub fn run(
    path: &Path,
    use_async: bool,
    repeat: usize,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let ops = read_operations(path)?;
    info!(operations = ops.len(), repeat, use_async, "submitting");
    let report = submit(&ops, use_async, repeat)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => {
            for outcome in &report.outcomes {
                println!("{} committed at {}", outcome.tx_id, outcome.tx_time);
            }
            println!();
            println!("=== Client Stats ({}) ===", report.mode);
            println!("Entries:          {}", report.stats.total_entries());
            println!("Operations:       {}", report.stats.operations_encoded);
            println!("Bytes encoded:    {}", report.stats.bytes_encoded);
            println!("Submission fails: {}", report.stats.submission_failures);
        }
    }
    Ok(())
}
