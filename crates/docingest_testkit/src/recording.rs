//! Recording log collaborator.
//!
//! [`RecordingLog`] commits everything it is given (ids from 1, commit time
//! from the wall clock) and remembers each entry together with the mode it
//! arrived through. Failures are scripted: queue errors with
//! [`fail_next`](RecordingLog::fail_next), drop the connection with
//! [`set_connected`](RecordingLog::set_connected), or pick how async
//! handles resolve with [`AsyncBehavior`]. Blocking submissions can be held
//! inside the log with [`hold_blocking`](RecordingLog::hold_blocking) to
//! stand in for a slow commit.

use docingest_core::resolution::{channel, Resolver};
use docingest_core::{
    CommitHandle, CommitOutcome, LogEntry, LogError, LogResult, OpKind, Timestamp, TxId, TxLog,
};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// Which submission path delivered an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// [`TxLog::submit`].
    Blocking,
    /// [`TxLog::submit_async`].
    Async,
}

/// An entry as the log received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedEntry {
    /// Submission path.
    pub mode: SubmitMode,
    /// The entry.
    pub entry: LogEntry,
}

/// How handles returned by [`TxLog::submit_async`] resolve.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AsyncBehavior {
    /// Commit at hand-off; the handle is resolved immediately.
    #[default]
    Resolve,
    /// Never resolve.
    NeverResolve,
    /// Resolve with [`LogError::TimedOut`].
    TimeOut,
    /// Resolve with a rejection carrying this reason.
    Reject(String),
    /// Stay pending until [`RecordingLog::resolve_pending`] is called.
    Manual,
}

struct State {
    received: Vec<ReceivedEntry>,
    next_tx: TxId,
    fail_next: VecDeque<LogError>,
    behavior: AsyncBehavior,
    cancellable: bool,
    async_supported: bool,
    connected: bool,
    closed: bool,
    close_count: usize,
    pending: Vec<Resolver>,
    stranded: Vec<Resolver>,
}

impl State {
    fn commit(&mut self) -> CommitOutcome {
        let tx_id = self.next_tx;
        self.next_tx = tx_id.next();
        CommitOutcome::new(tx_id, Timestamp::now())
    }

    /// Checks shared by both modes, before the entry counts as received.
    fn check_reachable(&self) -> LogResult<()> {
        if self.closed {
            return Err(LogError::Closed);
        }
        if !self.connected {
            return Err(LogError::unavailable("connection dropped"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct Gate {
    held: bool,
    parked: usize,
}

/// A scriptable [`TxLog`] that records what it receives.
pub struct RecordingLog {
    state: Mutex<State>,
    gate: Mutex<Gate>,
    gate_opened: Condvar,
}

impl Default for RecordingLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingLog {
    /// Creates a connected log whose async handles resolve at once.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                received: Vec::new(),
                next_tx: TxId::new(1),
                fail_next: VecDeque::new(),
                behavior: AsyncBehavior::Resolve,
                cancellable: false,
                async_supported: true,
                connected: true,
                closed: false,
                close_count: 0,
                pending: Vec::new(),
                stranded: Vec::new(),
            }),
            gate: Mutex::new(Gate::default()),
            gate_opened: Condvar::new(),
        }
    }

    /// Sets how async handles resolve, builder style.
    #[must_use]
    pub fn with_async_behavior(self, behavior: AsyncBehavior) -> Self {
        self.set_async_behavior(behavior);
        self
    }

    /// Makes async handles cancellable, builder style.
    #[must_use]
    pub fn cancellable(self) -> Self {
        self.state.lock().cancellable = true;
        self
    }

    /// Removes the async path entirely, builder style.
    #[must_use]
    pub fn without_async(self) -> Self {
        self.state.lock().async_supported = false;
        self
    }

    /// Sets how subsequent async handles resolve.
    pub fn set_async_behavior(&self, behavior: AsyncBehavior) {
        self.state.lock().behavior = behavior;
    }

    /// Simulates the connection going down or coming back.
    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// Queues an error for the next hand-off in either mode.
    pub fn fail_next(&self, err: LogError) {
        self.state.lock().fail_next.push_back(err);
    }

    /// Makes blocking submissions wait inside the log, after the entry is
    /// recorded, until [`release_blocking`](Self::release_blocking).
    pub fn hold_blocking(&self) {
        self.gate.lock().held = true;
    }

    /// Lets held blocking submissions return.
    pub fn release_blocking(&self) {
        self.gate.lock().held = false;
        self.gate_opened.notify_all();
    }

    /// Number of blocking submissions currently held.
    pub fn held_count(&self) -> usize {
        self.gate.lock().parked
    }

    fn pass_gate(&self) {
        let mut gate = self.gate.lock();
        gate.parked += 1;
        while gate.held {
            self.gate_opened.wait(&mut gate);
        }
        gate.parked -= 1;
    }

    /// Entries received so far, in hand-off order.
    pub fn received(&self) -> Vec<ReceivedEntry> {
        self.state.lock().received.clone()
    }

    /// Operation kinds of each received entry, in hand-off order.
    pub fn received_kinds(&self) -> Vec<Vec<OpKind>> {
        self.state
            .lock()
            .received
            .iter()
            .map(|r| r.entry.kinds())
            .collect()
    }

    /// Number of times [`close`](TxLog::close) was called.
    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    /// Number of async handles waiting for [`resolve_pending`](Self::resolve_pending).
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Commits every [`AsyncBehavior::Manual`] handle in hand-off order.
    ///
    /// Returns how many handles took the outcome; cancelled ones do not.
    pub fn resolve_pending(&self) -> usize {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        let mut resolved = 0;
        for resolver in pending {
            if resolver.is_cancelled() {
                continue;
            }
            let outcome = state.commit();
            if resolver.resolve(Ok(outcome)) {
                resolved += 1;
            }
        }
        resolved
    }

    /// Fails every [`AsyncBehavior::Manual`] handle with `err`.
    pub fn fail_pending(&self, err: LogError) {
        let pending = std::mem::take(&mut self.state.lock().pending);
        for resolver in pending {
            resolver.resolve(Err(err.clone()));
        }
    }
}

impl TxLog for RecordingLog {
    fn submit(&self, entry: &LogEntry) -> LogResult<CommitOutcome> {
        let result = {
            let mut state = self.state.lock();
            state.check_reachable()?;
            state.received.push(ReceivedEntry {
                mode: SubmitMode::Blocking,
                entry: entry.clone(),
            });
            match state.fail_next.pop_front() {
                Some(err) => Err(err),
                None => Ok(state.commit()),
            }
        };
        self.pass_gate();
        result
    }

    fn submit_async(&self, entry: LogEntry) -> LogResult<Box<dyn CommitHandle>> {
        let mut state = self.state.lock();
        if !state.async_supported {
            return Err(LogError::Unsupported {
                capability: "submit_async",
            });
        }
        state.check_reachable()?;
        state.received.push(ReceivedEntry {
            mode: SubmitMode::Async,
            entry,
        });
        if let Some(err) = state.fail_next.pop_front() {
            return Err(err);
        }

        let (resolver, handle) = channel(state.cancellable);
        match state.behavior.clone() {
            AsyncBehavior::Resolve => {
                let outcome = state.commit();
                resolver.resolve(Ok(outcome));
            }
            AsyncBehavior::TimeOut => {
                resolver.resolve(Err(LogError::TimedOut));
            }
            AsyncBehavior::Reject(reason) => {
                resolver.resolve(Err(LogError::rejected(reason)));
            }
            AsyncBehavior::NeverResolve => state.stranded.push(resolver),
            AsyncBehavior::Manual => state.pending.push(resolver),
        }
        Ok(Box::new(handle))
    }

    fn close(&self) -> LogResult<()> {
        let mut state = self.state.lock();
        state.close_count += 1;
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry() -> LogEntry {
        LogEntry::from_operations(std::iter::empty()).unwrap()
    }

    #[test]
    fn records_in_hand_off_order() {
        let log = RecordingLog::new();
        log.submit(&entry()).unwrap();
        log.submit_async(entry()).unwrap();

        let modes: Vec<_> = log.received().iter().map(|r| r.mode).collect();
        assert_eq!(modes, vec![SubmitMode::Blocking, SubmitMode::Async]);
    }

    #[test]
    fn fail_next_applies_once() {
        let log = RecordingLog::new();
        log.fail_next(LogError::rejected("nope"));
        assert_eq!(log.submit(&entry()), Err(LogError::rejected("nope")));
        assert!(log.submit(&entry()).is_ok());
    }

    #[test]
    fn disconnected_log_receives_nothing() {
        let log = RecordingLog::new();
        log.set_connected(false);
        assert!(matches!(log.submit(&entry()), Err(LogError::Unavailable { .. })));
        assert!(log.received().is_empty());
    }

    #[test]
    fn manual_handles_resolve_on_demand() {
        let log = RecordingLog::new().with_async_behavior(AsyncBehavior::Manual);
        let handle = log.submit_async(entry()).unwrap();
        assert_eq!(handle.try_outcome(), None);
        assert_eq!(log.pending_count(), 1);

        assert_eq!(log.resolve_pending(), 1);
        assert!(matches!(handle.try_outcome(), Some(Ok(_))));
    }

    #[test]
    fn never_resolving_handle_times_out_waits() {
        let log = RecordingLog::new().with_async_behavior(AsyncBehavior::NeverResolve);
        let handle = log.submit_async(entry()).unwrap();
        assert_eq!(handle.wait(Some(Duration::from_millis(5))), None);
        assert_eq!(log.resolve_pending(), 0);
    }

    #[test]
    fn held_blocking_submission_waits_for_release() {
        let log = std::sync::Arc::new(RecordingLog::new());
        log.hold_blocking();

        let submitter = {
            let log = std::sync::Arc::clone(&log);
            std::thread::spawn(move || log.submit(&entry()))
        };
        while log.held_count() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(log.received().len(), 1);
        assert!(log.submit_async(entry()).is_ok());
        assert!(!submitter.is_finished());

        log.release_blocking();
        assert_eq!(submitter.join().unwrap().unwrap().tx_id, TxId::new(1));
        assert_eq!(log.held_count(), 0);
    }

    #[test]
    fn close_is_counted() {
        let log = RecordingLog::new();
        log.close().unwrap();
        log.close().unwrap();
        assert_eq!(log.close_count(), 2);
        assert_eq!(log.submit(&entry()), Err(LogError::Closed));
    }
}
