//! Deferred results against scripted async behavior.

use docingest_core::{
    DeferredStatus, IngestError, LogError, SubmissionError, TxId,
};
use docingest_testkit::prelude::*;
use std::thread;
use std::time::Duration;

#[test]
fn never_resolving_handle_times_out_without_an_outcome() {
    let (_log, client) = recording_client_with(
        RecordingLog::new().with_async_behavior(AsyncBehavior::NeverResolve),
        Default::default(),
    );
    let deferred = client.submit_async([put("A", 1)]).unwrap();

    assert_eq!(deferred.poll(), Ok(None));
    let err = deferred.wait_timeout(Duration::from_millis(20)).unwrap_err();
    assert!(matches!(
        err,
        IngestError::Submission(ref e) if e.is_timeout()
    ));
    assert_eq!(deferred.status(), DeferredStatus::Pending);
}

#[test]
fn injected_log_timeout_fails_the_handle() {
    let (_log, client) = recording_client_with(
        RecordingLog::new().with_async_behavior(AsyncBehavior::TimeOut),
        Default::default(),
    );
    let deferred = client.submit_async([put("A", 1)]).unwrap();

    assert_eq!(
        deferred.wait(),
        Err(IngestError::Submission(SubmissionError::LogTimedOut))
    );
    assert_eq!(deferred.status(), DeferredStatus::Failed);
    // Terminal: waiting again gives the same answer.
    assert_eq!(
        deferred.wait_timeout(Duration::from_millis(1)),
        Err(IngestError::Submission(SubmissionError::LogTimedOut))
    );
}

#[test]
fn async_rejection() {
    let (_log, client) = recording_client_with(
        RecordingLog::new().with_async_behavior(AsyncBehavior::Reject("stale".into())),
        Default::default(),
    );
    let deferred = client.submit_async([put("A", 1)]).unwrap();
    assert_eq!(
        deferred.poll(),
        Err(IngestError::Submission(SubmissionError::Rejected {
            reason: "stale".into()
        }))
    );
}

#[test]
fn manual_resolution_wakes_waiter() {
    let (log, client) = recording_client_with(
        RecordingLog::new().with_async_behavior(AsyncBehavior::Manual),
        Default::default(),
    );
    let deferred = client.submit_async([put("A", 1)]).unwrap();
    assert_eq!(deferred.status(), DeferredStatus::Pending);

    let waiter = thread::spawn(move || deferred.wait());
    thread::sleep(Duration::from_millis(20));
    assert_eq!(log.resolve_pending(), 1);

    assert_eq!(waiter.join().unwrap().unwrap().tx_id, TxId::new(1));
}

#[test]
fn manual_failure() {
    let (log, client) = recording_client_with(
        RecordingLog::new().with_async_behavior(AsyncBehavior::Manual),
        Default::default(),
    );
    let deferred = client.submit_async([put("A", 1)]).unwrap();
    log.fail_pending(LogError::unavailable("lost leader"));
    assert!(matches!(
        deferred.wait(),
        Err(IngestError::Submission(
            SubmissionError::ConnectionUnavailable { .. }
        ))
    ));
}

#[test]
fn cancellation_unsupported_by_log() {
    let (_log, client) = recording_client_with(
        RecordingLog::new().with_async_behavior(AsyncBehavior::Manual),
        Default::default(),
    );
    let deferred = client.submit_async([put("A", 1)]).unwrap();

    assert!(!deferred.supports_cancel());
    assert_eq!(
        deferred.cancel(),
        Err(IngestError::Unsupported {
            capability: "cancel"
        })
    );
    assert_eq!(deferred.status(), DeferredStatus::Pending);
}

#[test]
fn cancellation_forwarded_to_log() {
    let (log, client) = recording_client_with(
        RecordingLog::new()
            .with_async_behavior(AsyncBehavior::Manual)
            .cancellable(),
        Default::default(),
    );
    let first = client.submit_async([put("A", 1)]).unwrap();
    let second = client.submit_async([put("A", 2)]).unwrap();

    assert_eq!(second.cancel(), Ok(true));
    assert_eq!(log.resolve_pending(), 1);

    assert_eq!(first.wait().unwrap().tx_id, TxId::new(1));
    assert_eq!(
        second.wait(),
        Err(IngestError::Submission(SubmissionError::Cancelled))
    );
    assert_eq!(second.cancel(), Ok(false));
}

#[test]
fn resolved_handle_is_stable() {
    let (_log, client) = recording_client();
    let deferred = client.submit_async([put("A", 1)]).unwrap();

    let first = deferred.poll().unwrap().unwrap();
    assert_eq!(deferred.wait().unwrap(), first);
    assert_eq!(deferred.wait_timeout(Duration::ZERO).unwrap(), first);
    assert_eq!(deferred.status(), DeferredStatus::Resolved);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resolve_async_from_tokio() {
    let (log, client) = recording_client_with(
        RecordingLog::new().with_async_behavior(AsyncBehavior::Manual),
        Default::default(),
    );
    let deferred = client.submit_async([put("A", 1)]).unwrap();
    let task = tokio::spawn(deferred.resolve_async());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(log.resolve_pending(), 1);
    assert_eq!(task.await.unwrap().unwrap().tx_id, TxId::new(1));
}

#[tokio::test]
async fn resolve_async_on_current_thread_runtime() {
    let (_log, client) = recording_client();
    let outcome = client
        .submit_async([put("A", 1)])
        .unwrap()
        .resolve_async()
        .await
        .unwrap();
    assert_eq!(outcome.tx_id, TxId::new(1));
}
