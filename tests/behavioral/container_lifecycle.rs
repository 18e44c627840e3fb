// ABOUTME: Behavioral tests for the container lifecycle controller
// Runs on the paused clock so running-state polls advance instantly.

use super::fixtures::{FakeEngine, CONTAINER_ID};
use boxwatch::docker::{ContainerHandle, ContainerLifecycle, PollPolicy};
use boxwatch::session::{OutputSink, SessionError};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn handle() -> ContainerHandle {
    ContainerHandle::new(CONTAINER_ID)
}

#[tokio::test]
async fn test_create_returns_engine_handle_and_echoes_warnings() {
    let engine = FakeEngine::new().with_warnings(&["Your kernel does not support swap limit"]);
    let (output, captured) = OutputSink::capture();

    let created = ContainerLifecycle::new(&engine, &output)
        .create("ubuntu:latest")
        .await
        .unwrap();

    assert_eq!(created, handle());
    assert_eq!(
        captured.lines(),
        vec!["Warning: Your kernel does not support swap limit"]
    );
}

// =============================================================================
// Test 1: Waiting prints one marker per poll
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_waiting_prints_marker_per_poll() {
    // Arrange: two "not running" answers before running
    let engine = FakeEngine::new().running_after(2);
    let (output, captured) = OutputSink::capture();
    let started = tokio::time::Instant::now();

    // Act
    let attempts = ContainerLifecycle::new(&engine, &output)
        .await_running(&handle(), PollPolicy::default())
        .await
        .unwrap();

    // Assert: three polls, one second apart
    assert_eq!(attempts, 3);
    assert_eq!(engine.count("is_running"), 3);
    assert_eq!(captured.contents(), "Waiting...\n");
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_query_failure_is_not_treated_as_not_running() {
    let engine = FakeEngine::new().with_query_error("No such container: fake-container");
    let (output, captured) = OutputSink::capture();

    let err = ContainerLifecycle::new(&engine, &output)
        .await_running(&handle(), PollPolicy::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Query(_)));
    assert_eq!(engine.count("is_running"), 1);
    assert_eq!(captured.contents(), "Waiting.\n");
}

#[tokio::test(start_paused = true)]
async fn test_bounded_wait_times_out() {
    let engine = FakeEngine::new().running_after(u32::MAX);
    let (output, _captured) = OutputSink::capture();
    let policy = PollPolicy {
        interval: Duration::from_millis(100),
        max_attempts: Some(5),
    };

    let err = ContainerLifecycle::new(&engine, &output)
        .await_running(&handle(), policy)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Timeout { attempts: 5 }));
    assert_eq!(err.to_string(), "Container not running after 5 polls");
}

// =============================================================================
// Test 2: Teardown reports failures and keeps going
// =============================================================================

#[tokio::test]
async fn test_teardown_attempts_remove_after_stop_failure() {
    let engine = FakeEngine::new().with_stop_error("cannot stop container: permission denied");
    let (output, captured) = OutputSink::capture();

    let report = ContainerLifecycle::new(&engine, &output).teardown(&handle()).await;

    assert!(!report.is_clean());
    assert!(matches!(report.stop_error, Some(SessionError::Stop(_))));
    assert!(report.remove_error.is_none());
    assert_eq!(engine.calls(), vec!["stop_container", "remove_container"]);
    assert_eq!(
        captured.lines(),
        vec![
            "Stopping container",
            "Container stop failed: cannot stop container: permission denied",
            "Removing container",
        ]
    );
}

#[tokio::test]
async fn test_teardown_reports_remove_failure() {
    let engine = FakeEngine::new().with_remove_error("removal already in progress");
    let (output, captured) = OutputSink::capture();

    let report = ContainerLifecycle::new(&engine, &output).teardown(&handle()).await;

    assert!(report.stop_error.is_none());
    assert!(matches!(report.remove_error, Some(SessionError::Remove(_))));
    assert_eq!(
        captured.lines().last().map(String::as_str),
        Some("Container removal failed: removal already in progress")
    );
}

#[tokio::test]
async fn test_clean_teardown() {
    let engine = FakeEngine::new();
    let (output, captured) = OutputSink::capture();

    let report = ContainerLifecycle::new(&engine, &output).teardown(&handle()).await;

    assert!(report.is_clean());
    assert_eq!(captured.lines(), vec!["Stopping container", "Removing container"]);
}
