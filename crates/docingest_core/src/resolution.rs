//! One-shot resolution primitive.
//!
//! [`channel`] returns a [`Resolver`], kept by whoever commits the entry,
//! and a [`Resolution`], handed to the client as its
//! [`CommitHandle`]. Waiting is a condition-variable wait, so a blocked
//! caller wakes as soon as the outcome is set.
//!
//! Dropping a pending `Resolver` resolves the handle with
//! [`LogError::Unavailable`]; a waiter is never stranded by a committer that
//! went away.

use crate::log::{CommitHandle, LogError, LogResult};
use crate::result::CommitOutcome;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Slot = Option<LogResult<CommitOutcome>>;

#[derive(Debug)]
struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
    cancellable: bool,
}

impl Shared {
    /// Stores `result` unless the slot is already set. Returns whether it was stored.
    fn set(&self, result: LogResult<CommitOutcome>) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(result);
        self.ready.notify_all();
        true
    }
}

/// Creates a linked resolver/handle pair.
///
/// With `cancellable` set, the handle accepts
/// [`cancel`](CommitHandle::cancel) until the resolver fires.
pub fn channel(cancellable: bool) -> (Resolver, Resolution) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        ready: Condvar::new(),
        cancellable,
    });
    (
        Resolver {
            shared: Arc::clone(&shared),
        },
        Resolution { shared },
    )
}

/// The committing side of a [`channel`].
#[derive(Debug)]
pub struct Resolver {
    shared: Arc<Shared>,
}

impl Resolver {
    /// Resolves the handle.
    ///
    /// Returns `false` if the handle was cancelled first; the result is
    /// then discarded.
    pub fn resolve(self, result: LogResult<CommitOutcome>) -> bool {
        self.shared.set(result)
    }

    /// Runs `commit` and resolves with its result, unless the handle was
    /// cancelled first, in which case `commit` never runs.
    ///
    /// Cancellation cannot interleave with `commit`: a caller that sees
    /// `cancel` return `Ok(true)` knows the entry was not committed.
    pub fn resolve_with(self, commit: impl FnOnce() -> LogResult<CommitOutcome>) -> bool {
        let mut slot = self.shared.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(commit());
        self.shared.ready.notify_all();
        true
    }

    /// Returns true once the handle has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.shared.slot.lock(), Some(Err(LogError::Cancelled)))
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.shared
            .set(Err(LogError::unavailable("committer dropped the entry")));
    }
}

/// The waiting side of a [`channel`].
#[derive(Debug, Clone)]
pub struct Resolution {
    shared: Arc<Shared>,
}

impl Resolution {
    /// A handle that is resolved from the start.
    pub fn resolved(result: LogResult<CommitOutcome>) -> Self {
        let (resolver, resolution) = channel(false);
        resolver.resolve(result);
        resolution
    }

    /// Returns true once an outcome is set.
    pub fn is_resolved(&self) -> bool {
        self.shared.slot.lock().is_some()
    }
}

impl CommitHandle for Resolution {
    fn try_outcome(&self) -> Option<LogResult<CommitOutcome>> {
        self.shared.slot.lock().clone()
    }

    fn wait(&self, timeout: Option<Duration>) -> Option<LogResult<CommitOutcome>> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut slot = self.shared.slot.lock();
        while slot.is_none() {
            match deadline {
                Some(deadline) => {
                    if self.shared.ready.wait_until(&mut slot, deadline).timed_out() {
                        break;
                    }
                }
                None => self.shared.ready.wait(&mut slot),
            }
        }
        slot.clone()
    }

    fn supports_cancel(&self) -> bool {
        self.shared.cancellable
    }

    fn cancel(&self) -> LogResult<bool> {
        if !self.shared.cancellable {
            return Err(LogError::Unsupported {
                capability: "cancel",
            });
        }
        Ok(self.shared.set(Err(LogError::Cancelled)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Timestamp, TxId};
    use std::thread;

    fn outcome(id: u64) -> CommitOutcome {
        CommitOutcome::new(TxId::new(id), Timestamp::from_millis(1_000))
    }

    #[test]
    fn resolve_then_read() {
        let (resolver, handle) = channel(false);
        assert_eq!(handle.try_outcome(), None);
        assert!(resolver.resolve(Ok(outcome(1))));
        assert_eq!(handle.try_outcome(), Some(Ok(outcome(1))));
        assert_eq!(handle.wait(None), Some(Ok(outcome(1))));
    }

    #[test]
    fn wait_times_out_while_pending() {
        let (_resolver, handle) = channel(false);
        assert_eq!(handle.wait(Some(Duration::from_millis(10))), None);
        assert!(!handle.is_resolved());
    }

    #[test]
    fn wait_wakes_on_resolution() {
        let (resolver, handle) = channel(false);
        let waiter = thread::spawn(move || handle.wait(None));
        thread::sleep(Duration::from_millis(20));
        resolver.resolve(Ok(outcome(7)));
        assert_eq!(waiter.join().unwrap(), Some(Ok(outcome(7))));
    }

    #[test]
    fn dropped_resolver_fails_the_handle() {
        let (resolver, handle) = channel(false);
        drop(resolver);
        assert!(matches!(
            handle.wait(None),
            Some(Err(LogError::Unavailable { .. }))
        ));
    }

    #[test]
    fn cancel_before_resolution() {
        let (resolver, handle) = channel(true);
        assert!(handle.supports_cancel());
        assert_eq!(handle.cancel(), Ok(true));
        assert!(resolver.is_cancelled());
        assert!(!resolver.resolve(Ok(outcome(1))));
        assert_eq!(handle.try_outcome(), Some(Err(LogError::Cancelled)));
    }

    #[test]
    fn cancel_after_resolution_is_a_no_op() {
        let (resolver, handle) = channel(true);
        resolver.resolve(Ok(outcome(2)));
        assert_eq!(handle.cancel(), Ok(false));
        assert_eq!(handle.try_outcome(), Some(Ok(outcome(2))));
    }

    #[test]
    fn resolve_with_skips_cancelled_work() {
        let (resolver, handle) = channel(true);
        handle.cancel().unwrap();
        let mut ran = false;
        assert!(!resolver.resolve_with(|| {
            ran = true;
            Ok(outcome(1))
        }));
        assert!(!ran);

        let (resolver, handle) = channel(true);
        assert!(resolver.resolve_with(|| Ok(outcome(2))));
        assert_eq!(handle.try_outcome(), Some(Ok(outcome(2))));
    }

    #[test]
    fn cancel_unsupported() {
        let (_resolver, handle) = channel(false);
        assert!(matches!(handle.cancel(), Err(LogError::Unsupported { .. })));
    }

    #[test]
    fn pre_resolved_handle() {
        let handle = Resolution::resolved(Err(LogError::rejected("no")));
        assert!(handle.is_resolved());
        assert_eq!(handle.wait(None), Some(Err(LogError::rejected("no"))));
    }
}
