// ABOUTME: Session orchestrator sequencing image resolution, container lifecycle and monitoring
// Guarantees teardown runs exactly once whenever a container handle was obtained.

use super::monitor::{MonitorExit, MonitorReport, SessionMonitor};
use super::{OutputSink, SessionError, SessionState};
use crate::config::SessionConfig;
use crate::docker::{
    ContainerEngine, ContainerHandle, ContainerLifecycle, ImageResolver, ResolvedImage,
    TeardownReport,
};
use crossterm::event::KeyEvent;
use futures_util::Stream;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub image: ResolvedImage,
    pub container: ContainerHandle,
    pub monitor: MonitorReport,
    pub teardown: TeardownReport,
}

pub struct Session {
    id: Uuid,
    engine: Arc<dyn ContainerEngine>,
    config: SessionConfig,
    output: OutputSink,
    state: SessionState,
}

impl Session {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: SessionConfig, output: OutputSink) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine,
            config,
            output,
            state: SessionState::ResolvingImage,
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Drive one session to completion. `keys` feeds the quit listener once monitoring starts.
    pub async fn run<S>(&mut self, keys: S) -> Result<SessionReport, SessionError>
    where
        S: Stream<Item = KeyEvent> + Send + Unpin + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let output = self.output.clone();
        let resolver = ImageResolver::new(engine.as_ref(), &output);
        let lifecycle = ContainerLifecycle::new(engine.as_ref(), &output);
        let reference = self.config.image_reference();

        info!(session_id = %self.id, image = %reference, "Starting session");

        let image = match resolver.resolve(&reference).await {
            Ok(image) => image,
            Err(e) => return Err(self.fail(e)),
        };
        output.line(format!("Image: {}", image.digest));

        self.transition(SessionState::CreatingContainer);
        let handle = match lifecycle.create(&reference.canonical()).await {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail(e)),
        };
        output.line(format!("Created container {handle}"));

        // From here on the container exists and must be released on every path
        if let Err(e) = lifecycle.start(&handle).await {
            return Err(self.abort_with_teardown(&lifecycle, &handle, e).await);
        }
        output.line("Started container");

        self.transition(SessionState::WaitingForContainerRunning);
        if let Err(e) = lifecycle.await_running(&handle, self.config.poll_policy()).await {
            return Err(self.abort_with_teardown(&lifecycle, &handle, e).await);
        }

        self.transition(SessionState::Monitoring);
        let monitor = SessionMonitor::new(
            Arc::clone(&engine),
            handle.clone(),
            output.clone(),
            self.config.monitor_settings(),
        );
        let monitor_report = monitor.run(keys, self.config.quit_key()).await;

        if monitor_report.exit == MonitorExit::Cancelled {
            self.transition(SessionState::Cancelled);
        }

        self.transition(SessionState::TearingDown);
        let teardown = lifecycle.teardown(&handle).await;

        if let MonitorExit::ProbeFailures { failures } = monitor_report.exit {
            return Err(self.fail(SessionError::ProbeFailures { failures }));
        }

        self.transition(SessionState::Done);
        info!(
            session_id = %self.id,
            probes = monitor_report.probes_completed,
            failures = monitor_report.probe_failures,
            "Session finished"
        );

        Ok(SessionReport {
            session_id: self.id,
            image,
            container: handle,
            monitor: monitor_report,
            teardown,
        })
    }

    async fn abort_with_teardown(
        &mut self,
        lifecycle: &ContainerLifecycle<'_>,
        handle: &ContainerHandle,
        cause: SessionError,
    ) -> SessionError {
        error!(session_id = %self.id, "Aborting session: {}", cause);

        self.transition(SessionState::TearingDown);
        lifecycle.teardown(handle).await;
        self.fail(cause)
    }

    fn fail(&mut self, cause: SessionError) -> SessionError {
        if self.state != SessionState::TearingDown {
            error!(session_id = %self.id, "Session failed: {}", cause);
        }
        self.transition(SessionState::Failed);
        cause
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid session transition {:?} -> {:?}",
            self.state,
            next
        );
        info!(session_id = %self.id, state = ?next, "{}", next.description());
        self.state = next;
    }
}
