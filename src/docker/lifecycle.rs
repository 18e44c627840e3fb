// ABOUTME: Container lifecycle controller: create, start, wait for running, stop and remove
// Owns the container for the whole session; probes only ever borrow its handle.

use super::engine::{ContainerEngine, ContainerHandle, RuntimeProfile};
use crate::session::{OutputSink, SessionError};
use std::time::Duration;
use tracing::{error, info, warn};

pub const PROGRESS_MARKER: &str = ".";

/// Poll cadence for [`ContainerLifecycle::await_running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the engine reports running
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

/// Outcome of teardown. Failures are reported, never propagated.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub stop_error: Option<SessionError>,
    pub remove_error: Option<SessionError>,
}

impl TeardownReport {
    pub const fn is_clean(&self) -> bool {
        self.stop_error.is_none() && self.remove_error.is_none()
    }
}

pub struct ContainerLifecycle<'a> {
    engine: &'a dyn ContainerEngine,
    output: &'a OutputSink,
    profile: RuntimeProfile,
}

impl<'a> ContainerLifecycle<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, output: &'a OutputSink) -> Self {
        Self {
            engine,
            output,
            profile: RuntimeProfile::default(),
        }
    }

    pub async fn create(&self, image: &str) -> Result<ContainerHandle, SessionError> {
        let created = self
            .engine
            .create_container(image, &self.profile)
            .await
            .map_err(SessionError::Create)?;

        for warning in &created.warnings {
            warn!("Engine warning creating container: {}", warning);
            self.output.line(format!("Warning: {warning}"));
        }

        Ok(created.handle)
    }

    pub async fn start(&self, handle: &ContainerHandle) -> Result<(), SessionError> {
        self.engine
            .start_container(handle)
            .await
            .map_err(SessionError::Start)
    }

    /// Poll until the engine reports the container running.
    ///
    /// Writes a `Waiting` prefix followed by one progress marker per query. A
    /// failed query aborts immediately instead of counting as "not running".
    pub async fn await_running(
        &self,
        handle: &ContainerHandle,
        policy: PollPolicy,
    ) -> Result<u32, SessionError> {
        self.output.inline("Waiting");
        let mut attempts = 0;

        loop {
            attempts += 1;
            self.output.inline(PROGRESS_MARKER);

            let running = match self.engine.is_running(handle).await {
                Ok(running) => running,
                Err(e) => {
                    self.output.end_inline();
                    return Err(SessionError::Query(e));
                }
            };

            if running {
                self.output.end_inline();
                info!("Container {} running after {} poll(s)", handle, attempts);
                return Ok(attempts);
            }

            if policy.max_attempts.is_some_and(|max| attempts >= max) {
                self.output.end_inline();
                return Err(SessionError::Timeout { attempts });
            }

            tokio::time::sleep(policy.interval).await;
        }
    }

    /// Stop then remove. Removal is attempted even when stopping fails.
    ///
    /// A container the engine no longer knows (404 on remove) is reported as
    /// already removed rather than as a failure.
    pub async fn teardown(&self, handle: &ContainerHandle) -> TeardownReport {
        let mut report = TeardownReport::default();

        self.output.line("Stopping container");
        if let Err(e) = self.engine.stop_container(handle).await {
            let e = SessionError::Stop(e);
            error!("Failed to stop container {}: {}", handle, e);
            self.output.line(e.to_string());
            report.stop_error = Some(e);
        }

        self.output.line("Removing container");
        match self.engine.remove_container(handle).await {
            Ok(()) => {}
            Err(e) if e.status_code() == Some(404) => {
                warn!("Container {} was already removed: {}", handle, e);
                self.output.line("Container already removed");
            }
            Err(e) => {
                let e = SessionError::Remove(e);
                error!("Failed to remove container {}: {}", handle, e);
                self.output.line(e.to_string());
                report.remove_error = Some(e);
            }
        }

        report
    }
}
