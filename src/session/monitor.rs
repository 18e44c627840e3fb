// ABOUTME: Session monitoring loop: periodic in-container probes multiplexed with a quit listener
// Probes and the listener are independent tasks publishing into one channel; a single select consumes it.

//! Monitoring loop for a running session container.
//!
//! ```text
//!  key stream ──▶ cancellation listener ──┐
//!                                          │  SessionSignal
//!  interval tick ──▶ probe task (exec) ────┼──────────────▶ select! ──▶ OutputSink
//!  interval tick ──▶ probe task (exec) ────┘
//! ```
//!
//! Probe tasks are never awaited by the scheduler, so slow probes overlap.
//! When the cancellation signal arrives the loop returns at once; probes still
//! in flight find the channel closed and their results are dropped.

use super::events::QuitKey;
use super::{OutputSink, SessionError};
use crate::docker::{ContainerEngine, ContainerHandle};
use chrono::{DateTime, Utc};
use crossterm::event::KeyEvent;
use futures_util::{Stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Output of one probe exec.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub sequence: u64,
    pub exec_id: String,
    pub output: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum SessionSignal {
    ProbeCompleted(ProbeResult),
    ProbeFailed { sequence: u64, error: SessionError },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub probe_interval: Duration,
    pub probe_command: Vec<String>,
    /// Skip a tick's launch while this many probes are still running
    pub max_in_flight: Option<usize>,
    /// Leave the loop after this many consecutive failed probes
    pub max_probe_failures: Option<u32>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(1),
            probe_command: default_probe_command(),
            max_in_flight: None,
            max_probe_failures: None,
        }
    }
}

/// Point-in-time load snapshot.
pub fn default_probe_command() -> Vec<String> {
    vec!["top".to_string(), "-b".to_string(), "-n".to_string(), "1".to_string()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    Cancelled,
    ProbeFailures { failures: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    pub probes_launched: u64,
    pub probes_skipped: u64,
    pub probes_completed: u64,
    pub probe_failures: u64,
    pub exit: MonitorExit,
}

pub struct SessionMonitor {
    engine: Arc<dyn ContainerEngine>,
    handle: ContainerHandle,
    output: OutputSink,
    settings: MonitorSettings,
    in_flight: Arc<AtomicUsize>,
}

impl SessionMonitor {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        handle: ContainerHandle,
        output: OutputSink,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            engine,
            handle,
            output,
            settings,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run until the quit key arrives on `keys` (or the probe-failure limit is hit).
    pub async fn run<S>(self, keys: S, quit_key: QuitKey) -> MonitorReport
    where
        S: Stream<Item = KeyEvent> + Send + Unpin + 'static,
    {
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let listener = spawn_cancellation_listener(keys, quit_key, signal_tx.clone());

        let period = self.settings.probe_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut report = MonitorReport {
            probes_launched: 0,
            probes_skipped: 0,
            probes_completed: 0,
            probe_failures: 0,
            exit: MonitorExit::Cancelled,
        };
        let mut consecutive_failures: u32 = 0;

        info!("Monitoring container {} every {:?}", self.handle, period);

        loop {
            tokio::select! {
                biased;

                Some(signal) = signal_rx.recv() => match signal {
                    SessionSignal::Cancelled => {
                        info!("Cancellation requested, leaving monitoring loop");
                        report.exit = MonitorExit::Cancelled;
                        break;
                    }
                    SessionSignal::ProbeCompleted(result) => {
                        consecutive_failures = 0;
                        report.probes_completed += 1;
                        debug!(
                            "Probe {} ({}) completed at {}",
                            result.sequence, result.exec_id, result.completed_at
                        );
                        self.output.line(&result.output);
                    }
                    SessionSignal::ProbeFailed { sequence, error } => {
                        consecutive_failures += 1;
                        report.probe_failures += 1;
                        warn!("Probe {} failed: {}", sequence, error);
                        self.output.line(format!("Probe failed: {error}"));

                        if self
                            .settings
                            .max_probe_failures
                            .is_some_and(|max| consecutive_failures >= max)
                        {
                            report.exit = MonitorExit::ProbeFailures {
                                failures: consecutive_failures,
                            };
                            break;
                        }
                    }
                },

                _ = ticker.tick() => {
                    if self.at_capacity() {
                        report.probes_skipped += 1;
                        debug!("Probe cap reached, skipping tick");
                        continue;
                    }
                    report.probes_launched += 1;
                    self.launch_probe(report.probes_launched, signal_tx.clone());
                }
            }
        }

        listener.abort();

        let abandoned = self.in_flight.load(Ordering::SeqCst);
        if abandoned > 0 {
            debug!("Abandoning {} in-flight probe(s)", abandoned);
        }

        report
    }

    fn at_capacity(&self) -> bool {
        self.settings
            .max_in_flight
            .is_some_and(|max| self.in_flight.load(Ordering::SeqCst) >= max)
    }

    fn launch_probe(&self, sequence: u64, signals: mpsc::UnboundedSender<SessionSignal>) {
        let engine = Arc::clone(&self.engine);
        let handle = self.handle.clone();
        let command = self.settings.probe_command.clone();
        let in_flight = Arc::clone(&self.in_flight);

        in_flight.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let signal = match run_probe(engine.as_ref(), &handle, &command, sequence).await {
                Ok(result) => SessionSignal::ProbeCompleted(result),
                Err(error) => SessionSignal::ProbeFailed { sequence, error },
            };
            in_flight.fetch_sub(1, Ordering::SeqCst);

            if signals.send(signal).is_err() {
                debug!("Probe {} finished after monitoring ended, result discarded", sequence);
            }
        });
    }
}

async fn run_probe(
    engine: &dyn ContainerEngine,
    handle: &ContainerHandle,
    command: &[String],
    sequence: u64,
) -> Result<ProbeResult, SessionError> {
    let exec_id = engine
        .create_exec(handle, command)
        .await
        .map_err(SessionError::ExecCreate)?;

    let output = engine
        .start_exec(&exec_id)
        .await
        .map_err(SessionError::ExecStart)?;

    Ok(ProbeResult {
        sequence,
        exec_id,
        output,
        completed_at: Utc::now(),
    })
}

/// Forward exactly one `Cancelled` signal when the quit key is seen, then stop.
///
/// Key input ending (stdin at EOF, reader thread gone) also cancels, since
/// nothing else could end the session afterwards.
pub fn spawn_cancellation_listener<S>(
    mut keys: S,
    quit_key: QuitKey,
    signals: mpsc::UnboundedSender<SessionSignal>,
) -> JoinHandle<()>
where
    S: Stream<Item = KeyEvent> + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        while let Some(key_event) = keys.next().await {
            if quit_key.is_quit(&key_event) {
                debug!("Quit key received: {:?}", key_event.code);
                let _ = signals.send(SessionSignal::Cancelled);
                return;
            }
        }
        warn!("Key input ended without a quit key, ending session");
        let _ = signals.send(SessionSignal::Cancelled);
    })
}
