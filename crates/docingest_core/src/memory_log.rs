//! In-memory reference log.
//!
//! [`InMemoryTxLog`] is a complete [`TxLog`]: blocking submissions commit
//! on the caller's thread, non-blocking submissions are queued to a
//! committer thread that commits them in hand-off order. It backs the CLI
//! and serves as a stand-in collaborator in tests.

use crate::entry::LogEntry;
use crate::log::{CommitHandle, LogError, LogResult, TxLog};
use crate::resolution::{channel, Resolver};
use crate::result::CommitOutcome;
use crate::types::{Timestamp, TxId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How the log treats an entry with no operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyEntryPolicy {
    /// Commit it as an empty transaction.
    #[default]
    Accept,
    /// Refuse it.
    Reject,
}

/// Configuration for [`InMemoryTxLog`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InMemoryLogConfig {
    /// Treatment of empty entries.
    pub empty_entry_policy: EmptyEntryPolicy,
    /// Simulated latency before the committer thread commits each entry.
    pub commit_delay: Duration,
}

impl InMemoryLogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the empty-entry policy.
    #[must_use]
    pub const fn empty_entry_policy(mut self, policy: EmptyEntryPolicy) -> Self {
        self.empty_entry_policy = policy;
        self
    }

    /// Sets the simulated commit latency.
    #[must_use]
    pub const fn commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = delay;
        self
    }
}

/// An entry the log has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEntry {
    /// Outcome assigned at commit.
    pub outcome: CommitOutcome,
    /// The entry as received.
    pub entry: LogEntry,
}

struct LogState {
    next_tx: TxId,
    last_time: Timestamp,
    committed: Vec<CommittedEntry>,
}

struct Shared {
    config: InMemoryLogConfig,
    state: Mutex<LogState>,
    closed: AtomicBool,
}

impl Shared {
    fn commit(&self, entry: &LogEntry) -> LogResult<CommitOutcome> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LogError::Closed);
        }
        if entry.is_empty() && self.config.empty_entry_policy == EmptyEntryPolicy::Reject {
            return Err(LogError::rejected("empty transaction"));
        }

        let mut state = self.state.lock();
        let tx_id = state.next_tx;
        // Commit times never go backwards, even if the wall clock does.
        let tx_time = Timestamp::now().max(state.last_time);
        state.next_tx = tx_id.next();
        state.last_time = tx_time;

        let outcome = CommitOutcome::new(tx_id, tx_time);
        state.committed.push(CommittedEntry {
            outcome,
            entry: entry.clone(),
        });
        tracing::trace!(%outcome, ops = entry.len(), "in-memory log committed entry");
        Ok(outcome)
    }
}

struct Job {
    entry: LogEntry,
    resolver: Resolver,
}

struct Committer {
    queue: Sender<Job>,
    thread: JoinHandle<()>,
}

/// A thread-safe, in-process transaction log.
///
/// Transaction ids start at 1 and increase by one per commit. Async
/// handles support cancellation until the committer thread picks the
/// entry up.
pub struct InMemoryTxLog {
    shared: Arc<Shared>,
    committer: Mutex<Option<Committer>>,
}

impl Default for InMemoryTxLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTxLog {
    /// Creates a log with default configuration.
    pub fn new() -> Self {
        Self::with_config(InMemoryLogConfig::default())
    }

    /// Creates a log with the given configuration.
    pub fn with_config(config: InMemoryLogConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(LogState {
                    next_tx: TxId::new(1),
                    last_time: Timestamp::EPOCH,
                    committed: Vec::new(),
                }),
                closed: AtomicBool::new(false),
            }),
            committer: Mutex::new(None),
        }
    }

    /// All committed entries, in commit order.
    pub fn committed(&self) -> Vec<CommittedEntry> {
        self.shared.state.lock().committed.clone()
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.shared.state.lock().committed.len()
    }

    /// Returns true if nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once [`close`](TxLog::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn enqueue(&self, job: Job) -> LogResult<()> {
        let mut committer = self.committer.lock();
        // `close` sets the flag before taking this lock.
        if self.is_closed() {
            return Err(LogError::Closed);
        }
        if committer.is_none() {
            *committer = Some(self.spawn_committer()?);
        }
        match committer.as_ref() {
            Some(c) => c.queue.send(job).map_err(|_| LogError::Closed),
            None => Err(LogError::Closed),
        }
    }

    fn spawn_committer(&self) -> LogResult<Committer> {
        let (queue, jobs) = mpsc::channel::<Job>();
        let shared = Arc::clone(&self.shared);
        let thread = thread::Builder::new()
            .name("docingest-committer".into())
            .spawn(move || {
                for Job { entry, resolver } in jobs {
                    if !shared.config.commit_delay.is_zero() {
                        thread::sleep(shared.config.commit_delay);
                    }
                    resolver.resolve_with(|| shared.commit(&entry));
                }
            })
            .map_err(|e| LogError::unavailable(format!("cannot start committer: {e}")))?;
        Ok(Committer { queue, thread })
    }
}

impl TxLog for InMemoryTxLog {
    fn submit(&self, entry: &LogEntry) -> LogResult<CommitOutcome> {
        self.shared.commit(entry)
    }

    fn submit_async(&self, entry: LogEntry) -> LogResult<Box<dyn CommitHandle>> {
        if self.is_closed() {
            return Err(LogError::Closed);
        }
        let (resolver, handle) = channel(true);
        self.enqueue(Job { entry, resolver })?;
        Ok(Box::new(handle))
    }

    fn close(&self) -> LogResult<()> {
        self.shared.closed.store(true, Ordering::Release);
        let committer = self.committer.lock().take();
        if let Some(Committer { queue, thread }) = committer {
            // Closing the queue lets the committer drain; queued entries fail
            // with Closed because the flag is already set.
            drop(queue);
            thread
                .join()
                .map_err(|_| LogError::unavailable("committer thread panicked"))?;
            tracing::debug!("in-memory log committer stopped");
        }
        Ok(())
    }
}

impl Drop for InMemoryTxLog {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
