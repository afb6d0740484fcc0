//! Stress utilities for the submission gateway.
//!
//! These drive many concurrent submissions through one shared client.

use crate::fixtures::put;
use docingest_core::IngestClient;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total submissions attempted.
    pub total_ops: usize,
    /// Submissions that committed.
    pub successful_ops: usize,
    /// Submissions that failed.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        Self {
            total_ops: successful + failed,
            successful_ops: successful,
            failed_ops: failed,
            duration,
        }
    }

    /// Submissions per second.
    #[allow(clippy::cast_precision_loss)]
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_ops as f64 / secs
        } else {
            0.0
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Submissions per thread.
    pub submissions_per_thread: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Operations per submitted entry.
    pub ops_per_entry: usize,
    /// Submit through the non-blocking path and wait on each handle.
    pub use_async: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            submissions_per_thread: 100,
            threads: 4,
            ops_per_entry: 4,
            use_async: false,
        }
    }
}

/// Submits from `config.threads` threads at once through one client.
///
/// Thread `t` writes keys `t/<n>`, so every entry is distinguishable.
pub fn stress_concurrent_submissions(
    client: Arc<IngestClient>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let client = Arc::clone(&client);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();

            thread::spawn(move || {
                for i in 0..config.submissions_per_thread {
                    let ops: Vec<_> = (0..config.ops_per_entry)
                        .map(|n| put(&format!("t{t}/k{n}"), i as i64))
                        .collect();
                    let result = if config.use_async {
                        client.submit_async(ops).and_then(|d| d.wait())
                    } else {
                        client.submit(ops).map(|r| r.outcome())
                    };
                    match result {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::memory_client;

    #[test]
    fn concurrent_blocking_submissions_all_commit() {
        let (log, client) = memory_client();
        let config = StressConfig {
            submissions_per_thread: 20,
            ..StressConfig::default()
        };
        let result = stress_concurrent_submissions(Arc::new(client), &config);

        assert_eq!(result.successful_ops, 80);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(log.len(), 80);
    }

    #[test]
    fn concurrent_async_submissions_all_commit() {
        let (log, client) = memory_client();
        let config = StressConfig {
            submissions_per_thread: 20,
            use_async: true,
            ..StressConfig::default()
        };
        let result = stress_concurrent_submissions(Arc::new(client), &config);

        assert_eq!(result.successful_ops, 80);
        assert_eq!(log.len(), 80);
    }
}
