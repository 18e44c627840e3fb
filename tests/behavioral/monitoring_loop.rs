// ABOUTME: Behavioral tests for the monitoring loop's probe scheduling and cancellation
// All timings are on tokio's paused clock; ticks land at 1s, 2s, 3s, ... after monitoring starts.

use super::fixtures::{key, key_channel, probe_lines, FakeEngine, CONTAINER_ID};
use boxwatch::docker::{ContainerEngine, ContainerHandle};
use boxwatch::session::{MonitorExit, MonitorSettings, OutputSink, QuitKey, SessionMonitor};
use crossterm::event::KeyEvent;
use futures_util::stream;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn monitor(engine: &Arc<FakeEngine>, output: &OutputSink, settings: MonitorSettings) -> SessionMonitor {
    let engine: Arc<dyn ContainerEngine> = engine.clone();
    SessionMonitor::new(engine, ContainerHandle::new(CONTAINER_ID), output.clone(), settings)
}

// =============================================================================
// Test 1: One probe per tick until quit
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_probe_runs_every_interval_until_quit() {
    // Arrange
    let engine = Arc::new(FakeEngine::new());
    let (output, captured) = OutputSink::capture();
    let (tx, keys) = key_channel();

    // Act: quit between the third and fourth tick
    let quit = async {
        tokio::time::sleep(Duration::from_millis(3500)).await;
        tx.send(key('q')).unwrap();
    };
    let (report, ()) = tokio::join!(
        monitor(&engine, &output, MonitorSettings::default()).run(keys, QuitKey::default()),
        quit
    );

    // Assert
    assert_eq!(report.exit, MonitorExit::Cancelled);
    assert_eq!(report.probes_launched, 3);
    assert_eq!(report.probes_completed, 3);
    assert_eq!(probe_lines(&captured.lines()), 3);
    assert_eq!(engine.count("create_exec"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_quit_before_first_tick_runs_no_probe() {
    let engine = Arc::new(FakeEngine::new());
    let (output, captured) = OutputSink::capture();
    let (tx, keys) = key_channel();
    tx.send(key('Q')).unwrap();

    let report = monitor(&engine, &output, MonitorSettings::default())
        .run(keys, QuitKey::default())
        .await;

    assert_eq!(report.probes_launched, 0);
    assert!(captured.contents().is_empty());
    assert_eq!(engine.count("create_exec"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_closed_key_input_ends_monitoring() {
    // Arrange: stdin already at EOF, nothing can ever press q
    let engine = Arc::new(FakeEngine::new());
    let (output, _captured) = OutputSink::capture();

    // Act
    let report = tokio::time::timeout(
        Duration::from_secs(60),
        monitor(&engine, &output, MonitorSettings::default())
            .run(stream::empty::<KeyEvent>(), QuitKey::default()),
    )
    .await
    .expect("monitoring should end when key input closes");

    // Assert
    assert_eq!(report.exit, MonitorExit::Cancelled);
    assert_eq!(report.probes_launched, 0);
}

#[tokio::test(start_paused = true)]
async fn test_other_keys_do_not_cancel() {
    let engine = Arc::new(FakeEngine::new());
    let (output, _captured) = OutputSink::capture();
    let (tx, keys) = key_channel();

    let typing = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(key('x')).unwrap();
        tx.send(key('w')).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        tx.send(key('q')).unwrap();
    };
    let (report, ()) = tokio::join!(
        monitor(&engine, &output, MonitorSettings::default()).run(keys, QuitKey::default()),
        typing
    );

    assert_eq!(report.probes_launched, 2);
}

// =============================================================================
// Test 2: Slow probes overlap and are abandoned on quit
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_slow_probe_output_is_dropped_after_quit() {
    // Arrange: each probe takes five seconds
    let engine = Arc::new(FakeEngine::new().with_exec_delay(Duration::from_secs(5)));
    let (output, captured) = OutputSink::capture();
    let (tx, keys) = key_channel();

    // Act: quit at 2.5s with probes from t=1s and t=2s still running
    let quit = async {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        tx.send(key('q')).unwrap();
    };
    let (report, ()) = tokio::join!(
        monitor(&engine, &output, MonitorSettings::default()).run(keys, QuitKey::default()),
        quit
    );
    tokio::time::sleep(Duration::from_secs(10)).await;

    // Assert: the loop never waited for them and nothing printed late
    assert_eq!(report.probes_launched, 2);
    assert_eq!(report.probes_completed, 0);
    assert_eq!(engine.count("start_exec"), 2);
    assert!(captured.contents().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_probes_overlap_when_slower_than_interval() {
    let engine = Arc::new(FakeEngine::new().with_exec_delay(Duration::from_millis(2500)));
    let (output, captured) = OutputSink::capture();
    let (tx, keys) = key_channel();

    // Launches at 1..=5s, completions at 3.5s and 4.5s
    let quit = async {
        tokio::time::sleep(Duration::from_millis(5200)).await;
        tx.send(key('q')).unwrap();
    };
    let (report, ()) = tokio::join!(
        monitor(&engine, &output, MonitorSettings::default()).run(keys, QuitKey::default()),
        quit
    );

    assert_eq!(report.probes_launched, 5);
    assert_eq!(report.probes_completed, 2);
    assert_eq!(probe_lines(&captured.lines()), 2);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_cap_skips_ticks() {
    let engine = Arc::new(FakeEngine::new().with_exec_delay(Duration::from_millis(2500)));
    let (output, _captured) = OutputSink::capture();
    let (tx, keys) = key_channel();
    let settings = MonitorSettings {
        max_in_flight: Some(1),
        ..MonitorSettings::default()
    };

    // Probe from 1s holds the slot until 3.5s, the next one launches at 4s
    let quit = async {
        tokio::time::sleep(Duration::from_millis(5200)).await;
        tx.send(key('q')).unwrap();
    };
    let (report, ()) = tokio::join!(
        monitor(&engine, &output, settings).run(keys, QuitKey::default()),
        quit
    );

    assert_eq!(report.probes_launched, 2);
    assert_eq!(report.probes_skipped, 3);
    assert_eq!(report.probes_completed, 1);
}

// =============================================================================
// Test 3: Probe failures are reported, not fatal by default
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_probes_are_reported_and_loop_continues() {
    let engine = Arc::new(FakeEngine::new().with_exec_error("container is not running"));
    let (output, captured) = OutputSink::capture();
    let (tx, keys) = key_channel();

    let quit = async {
        tokio::time::sleep(Duration::from_millis(3500)).await;
        tx.send(key('q')).unwrap();
    };
    let (report, ()) = tokio::join!(
        monitor(&engine, &output, MonitorSettings::default()).run(keys, QuitKey::default()),
        quit
    );

    assert_eq!(report.exit, MonitorExit::Cancelled);
    assert_eq!(report.probe_failures, 3);
    assert_eq!(report.probes_completed, 0);
    assert_eq!(
        captured.lines(),
        vec!["Probe failed: Exec start failed: container is not running"; 3]
    );
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_failure_limit_ends_monitoring() {
    let engine = Arc::new(FakeEngine::new().with_exec_error("container is not running"));
    let (output, _captured) = OutputSink::capture();
    let (_tx, keys) = key_channel();
    let settings = MonitorSettings {
        max_probe_failures: Some(3),
        ..MonitorSettings::default()
    };

    let report = monitor(&engine, &output, settings)
        .run(keys, QuitKey::default())
        .await;

    assert_eq!(report.exit, MonitorExit::ProbeFailures { failures: 3 });
    assert_eq!(report.probes_launched, 3);
}

#[tokio::test(start_paused = true)]
async fn test_custom_quit_key() {
    let engine = Arc::new(FakeEngine::new());
    let (output, _captured) = OutputSink::capture();
    let (tx, keys) = key_channel();

    let quit = async {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        // Default key no longer quits
        tx.send(key('q')).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(key('x')).unwrap();
    };
    let (report, ()) = tokio::join!(
        monitor(&engine, &output, MonitorSettings::default()).run(keys, QuitKey::new('x')),
        quit
    );

    assert_eq!(report.probes_launched, 2);
}
