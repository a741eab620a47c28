// crates/core/src/controller.rs
//! Lifecycle control for one (project, environment) session.
//!
//! Commands (`start`, `stop`, `restart`) are serialized by a per-session
//! command lock. Every mutation of lifecycle, web UI URL and poll handle
//! happens under the state lock and is published to the hub before the lock
//! is released, so observers see transitions in issuance order.
//!
//! The reconciliation loop runs whenever the lifecycle is not `Stopped`. Its
//! results are applied only if nothing moved underneath it: the session is
//! still open, its poll token is live, no command is in flight and no
//! transition happened since the cycle began.

use std::sync::Arc;

use tilt_orchestrator_types::{Lifecycle, Notice, ObserverSnapshot, Project};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analyzer::analyze;
use crate::config::ControllerConfig;
use crate::error::{BackendError, CommandError};
use crate::gateway::BackendGateway;
use crate::hub::ObserverHub;
use crate::scheduler::PollHandle;

// =============================================================================
// Session state
// =============================================================================

#[derive(Default)]
struct SessionState {
    lifecycle: Lifecycle,
    web_ui_url: Option<String>,
    /// Most recent fetch window, replaced wholesale on each fetch.
    logs: Vec<String>,
    /// Present iff `lifecycle != Stopped` while the session is open.
    poll: Option<PollHandle>,
    /// Bumped on every lifecycle change; a reconcile cycle that started under
    /// an older epoch is discarded.
    epoch: u64,
}

pub(crate) struct Inner {
    project: Project,
    env: String,
    backend: Arc<dyn BackendGateway>,
    hub: ObserverHub,
    config: ControllerConfig,
    commands: Mutex<()>,
    state: Mutex<SessionState>,
    closed: CancellationToken,
}

impl Inner {
    fn snapshot_of(&self, state: &SessionState) -> ObserverSnapshot {
        ObserverSnapshot {
            project: Some(self.project.name().to_string()),
            env: Some(self.env.clone()),
            lifecycle: state.lifecycle,
            web_ui_url: state.web_ui_url.clone(),
        }
    }

    fn publish(&self, state: &SessionState) {
        self.hub.publish(self.snapshot_of(state));
    }

    fn ensure_open(&self) -> Result<(), CommandError> {
        if self.closed.is_cancelled() {
            return Err(CommandError::SessionClosed);
        }
        Ok(())
    }

    /// Checked again once a backend call returns: `close` does not wait for
    /// in-flight commands, so the session may have ended meanwhile and the
    /// command's transitions were dropped.
    fn ensure_still_open(&self, command: &'static str) -> Result<(), CommandError> {
        if self.closed.is_cancelled() {
            warn!(env = %self.env, command, "session closed while the command ran");
            return Err(CommandError::SessionClosed);
        }
        Ok(())
    }

    fn ensure_startable(&self) -> Result<(), CommandError> {
        let environment =
            self.project
                .environment(&self.env)
                .ok_or_else(|| CommandError::EnvironmentNotFound {
                    env: self.env.clone(),
                })?;
        if !environment.has_enabled_services() {
            info!(
                project = %self.project.name(),
                env = %self.env,
                "start rejected: no enabled services"
            );
            return Err(CommandError::NoEnabledServices {
                env: self.env.clone(),
            });
        }
        Ok(())
    }

    async fn lifecycle(&self) -> Lifecycle {
        self.state.lock().await.lifecycle
    }

    /// Set the lifecycle and keep the poll handle in step with it.
    fn set_lifecycle(self: &Arc<Self>, state: &mut SessionState, to: Lifecycle) {
        state.lifecycle = to;
        state.epoch += 1;
        if to != Lifecycle::Running {
            state.web_ui_url = None;
        }
        if to.is_active() {
            if state.poll.is_none() {
                state.poll = Some(PollHandle::spawn(
                    Arc::downgrade(self),
                    &self.closed,
                    self.config.poll_interval(),
                ));
            }
        } else if let Some(poll) = state.poll.take() {
            // the loop may be the caller; never wait on it here
            drop(poll.cancel());
        }
    }

    /// Command-driven transition. No-op once the session is closed.
    async fn transition(self: &Arc<Self>, to: Lifecycle) {
        let mut state = self.state.lock().await;
        if self.closed.is_cancelled() {
            return;
        }
        let from = state.lifecycle;
        self.set_lifecycle(&mut state, to);
        debug!(env = %self.env, %from, %to, "transition");
        self.publish(&state);
    }

    fn report_reconcile_failure(&self, error: &BackendError) {
        warn!(
            project = %self.project.name(),
            env = %self.env,
            error = %error,
            "reconciliation failed"
        );
        self.hub
            .notify(Notice::warning("Failed to refresh Tilt status", error.to_string()));
    }

    /// One reconciliation cycle: query status, fetch logs while running,
    /// derive the URL, publish on change.
    pub(crate) async fn reconcile(self: &Arc<Self>, token: &CancellationToken) {
        let epoch = self.state.lock().await.epoch;

        let status = self
            .backend
            .query_status(&self.project, &self.env)
            .await
            .and_then(|report| report.lifecycle());
        let observed = match status {
            Ok(observed) => observed,
            Err(e) => {
                if !token.is_cancelled() {
                    self.report_reconcile_failure(&e);
                }
                return;
            }
        };

        let logs = if observed == Lifecycle::Running {
            match self
                .backend
                .fetch_logs(&self.project, &self.env, Some(self.config.log_window))
                .await
            {
                Ok(window) => Some(window.logs),
                Err(e) => {
                    if !token.is_cancelled() {
                        self.report_reconcile_failure(&e);
                    }
                    None
                }
            }
        } else {
            None
        };

        let Ok(_command) = self.commands.try_lock() else {
            debug!(env = %self.env, "command in flight, discarding reconcile result");
            return;
        };
        let mut state = self.state.lock().await;
        if token.is_cancelled() || self.closed.is_cancelled() || state.epoch != epoch {
            debug!(env = %self.env, "stale reconcile result discarded");
            return;
        }

        if let Some(logs) = logs {
            state.logs = logs;
        }
        if observed != state.lifecycle {
            info!(
                project = %self.project.name(),
                env = %self.env,
                from = %state.lifecycle,
                to = %observed,
                "lifecycle reconciled"
            );
            self.set_lifecycle(&mut state, observed);
        }
        let analysis = analyze(&state.logs, state.lifecycle);
        state.web_ui_url = analysis.retain(state.web_ui_url.as_deref());
        self.publish(&state);
    }
}

// =============================================================================
// SessionController
// =============================================================================

/// Owns the lifecycle of a single Tilt session.
///
/// Dropping the controller cancels its poll loop; [`SessionController::close`]
/// additionally publishes the cleared snapshot and waits for the loop.
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Create the session for `env` and reconcile once against the backend.
    /// The tool may already be running from a previous session.
    pub async fn open(
        project: Project,
        env: impl Into<String>,
        backend: Arc<dyn BackendGateway>,
        hub: ObserverHub,
        config: ControllerConfig,
    ) -> Result<Self, CommandError> {
        let env = env.into();
        if project.environment(&env).is_none() {
            return Err(CommandError::EnvironmentNotFound { env });
        }

        let inner = Arc::new(Inner {
            project,
            env,
            backend,
            hub,
            config,
            commands: Mutex::new(()),
            state: Mutex::new(SessionState::default()),
            closed: CancellationToken::new(),
        });
        {
            let state = inner.state.lock().await;
            inner.publish(&state);
        }
        info!(project = %inner.project.name(), env = %inner.env, "session opened");

        let token = inner.closed.clone();
        inner.reconcile(&token).await;
        Ok(Self { inner })
    }

    pub fn project(&self) -> &Project {
        &self.inner.project
    }

    pub fn env(&self) -> &str {
        &self.inner.env
    }

    pub fn hub(&self) -> &ObserverHub {
        &self.inner.hub
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle().await
    }

    pub async fn snapshot(&self) -> ObserverSnapshot {
        let state = self.inner.state.lock().await;
        self.inner.snapshot_of(&state)
    }

    /// The most recent log window.
    pub async fn logs(&self) -> Vec<String> {
        self.inner.state.lock().await.logs.clone()
    }

    pub async fn is_polling(&self) -> bool {
        self.inner.state.lock().await.poll.is_some()
    }

    /// `Stopped -> Starting -> Running`, or back to `Stopped` on failure.
    pub async fn start(&self) -> Result<(), CommandError> {
        let inner = &self.inner;
        let _command = inner.commands.lock().await;
        inner.ensure_open()?;
        inner.ensure_startable()?;
        let from = inner.lifecycle().await;
        if from != Lifecycle::Stopped {
            return Err(CommandError::InvalidTransition {
                command: "start",
                from,
            });
        }

        inner.transition(Lifecycle::Starting).await;
        info!(project = %inner.project.name(), env = %inner.env, "starting tilt");
        match inner.backend.start(&inner.project, &inner.env).await {
            Ok(()) => {
                inner.ensure_still_open("start")?;
                inner.transition(Lifecycle::Running).await;
                Ok(())
            }
            Err(e) => {
                warn!(env = %inner.env, error = %e, "tilt start failed");
                inner.transition(Lifecycle::Stopped).await;
                Err(e.into())
            }
        }
    }

    /// `Running|Starting -> Stopping -> Stopped`. A failed stop restores the
    /// lifecycle the command started from.
    pub async fn stop(&self) -> Result<(), CommandError> {
        let inner = &self.inner;
        let _command = inner.commands.lock().await;
        inner.ensure_open()?;
        let from = inner.lifecycle().await;
        if !matches!(from, Lifecycle::Running | Lifecycle::Starting) {
            return Err(CommandError::InvalidTransition {
                command: "stop",
                from,
            });
        }

        inner.transition(Lifecycle::Stopping).await;
        info!(project = %inner.project.name(), env = %inner.env, "stopping tilt");
        match inner.backend.stop(&inner.project, &inner.env).await {
            Ok(()) => {
                inner.ensure_still_open("stop")?;
                inner.transition(Lifecycle::Stopped).await;
                Ok(())
            }
            Err(e) => {
                warn!(env = %inner.env, error = %e, reverting_to = %from, "tilt stop failed");
                inner.transition(from).await;
                Err(e.into())
            }
        }
    }

    /// Stop, wait the settle delay, start. The first failing step wins: a
    /// failed stop reverts to `Running` and start is never attempted; a
    /// failed start leaves the session `Stopped`.
    pub async fn restart(&self) -> Result<(), CommandError> {
        let inner = &self.inner;
        let _command = inner.commands.lock().await;
        inner.ensure_open()?;
        let from = inner.lifecycle().await;
        if from != Lifecycle::Running {
            return Err(CommandError::InvalidTransition {
                command: "restart",
                from,
            });
        }
        inner.ensure_startable()?;

        info!(project = %inner.project.name(), env = %inner.env, "restarting tilt");
        inner.transition(Lifecycle::Stopping).await;
        if let Err(e) = inner.backend.stop(&inner.project, &inner.env).await {
            warn!(env = %inner.env, error = %e, "restart: stop failed");
            inner.transition(from).await;
            return Err(e.into());
        }
        inner.ensure_still_open("restart")?;
        inner.transition(Lifecycle::Stopped).await;

        tokio::select! {
            _ = inner.closed.cancelled() => return Err(CommandError::SessionClosed),
            _ = tokio::time::sleep(inner.config.settle_delay()) => {}
        }

        inner.transition(Lifecycle::Starting).await;
        match inner.backend.start(&inner.project, &inner.env).await {
            Ok(()) => {
                inner.ensure_still_open("restart")?;
                inner.transition(Lifecycle::Running).await;
                Ok(())
            }
            Err(e) => {
                warn!(env = %inner.env, error = %e, "restart: start failed");
                inner.transition(Lifecycle::Stopped).await;
                Err(e.into())
            }
        }
    }

    /// Regenerate the environment's Tiltfiles. Callers confirm with the user
    /// first: this overwrites generated files.
    pub async fn generate_artifacts(&self) -> Result<(), CommandError> {
        let inner = &self.inner;
        let _command = inner.commands.lock().await;
        inner.ensure_open()?;
        inner
            .backend
            .generate_artifacts(&inner.project, &inner.env)
            .await?;
        info!(project = %inner.project.name(), env = %inner.env, "tiltfiles generated");
        Ok(())
    }

    pub async fn open_in_editor(
        &self,
        service: &str,
        editor: Option<&str>,
    ) -> Result<(), CommandError> {
        let inner = &self.inner;
        inner.ensure_open()?;
        let service = inner
            .project
            .environment(&inner.env)
            .and_then(|env| env.service(service))
            .ok_or_else(|| CommandError::ServiceNotFound {
                service: service.to_string(),
            })?;
        inner
            .backend
            .open_in_editor(&inner.project, service, editor)
            .await?;
        Ok(())
    }

    /// Tear the session down: optionally stop the tool, publish the cleared
    /// snapshot, cancel the poll loop and wait for it to exit. After this
    /// returns nothing is published for this session. Idempotent.
    ///
    /// In-flight commands are not awaited; one whose backend call completes
    /// after this returns fails with [`CommandError::SessionClosed`].
    pub async fn close(&self, stop_tool: bool) -> Result<(), CommandError> {
        let inner = &self.inner;
        let mut result = Ok(());
        if stop_tool && !self.is_closed() {
            let from = inner.lifecycle().await;
            if matches!(from, Lifecycle::Running | Lifecycle::Starting) {
                result = self.stop().await;
            }
        }

        let poll = {
            let mut state = inner.state.lock().await;
            if inner.closed.is_cancelled() {
                return result;
            }
            inner.hub.clear();
            inner.closed.cancel();
            state.poll.take()
        };
        if let Some(poll) = poll {
            let task = poll.cancel();
            task.abort();
            let _ = task.await;
        }
        info!(project = %inner.project.name(), env = %inner.env, "session closed");
        result
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.inner.closed.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, ScriptedBackend};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    const BANNER: &str = "Tilt started on http://localhost:10350/";

    async fn open_with(
        backend: &Arc<ScriptedBackend>,
        project: Project,
        hub: &ObserverHub,
    ) -> SessionController {
        SessionController::open(
            project,
            "dev",
            backend.clone(),
            hub.clone(),
            ControllerConfig::default(),
        )
        .await
        .unwrap()
    }

    async fn open(backend: &Arc<ScriptedBackend>) -> (SessionController, ObserverHub) {
        let hub = ObserverHub::new();
        let controller = open_with(backend, testing::project_with_services(&["api"]), &hub).await;
        (controller, hub)
    }

    async fn assert_poll_invariant(c: &SessionController) {
        assert_eq!(c.is_polling().await, c.lifecycle().await != Lifecycle::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn open_reconciles_with_already_running_tool() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_status("running");
        backend.set_logs([BANNER, "api | listening"]);

        let (c, hub) = open(&backend).await;
        assert_eq!(c.lifecycle().await, Lifecycle::Running);
        assert_poll_invariant(&c).await;
        assert_eq!(
            hub.latest(),
            ObserverSnapshot {
                project: Some("shop".into()),
                env: Some("dev".into()),
                lifecycle: Lifecycle::Running,
                web_ui_url: Some("http://localhost:10350/".into()),
            }
        );
        assert_eq!(c.logs().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn open_rejects_unknown_environment() {
        let backend = Arc::new(ScriptedBackend::new());
        let err = SessionController::open(
            testing::project_with_services(&["api"]),
            "staging",
            backend.clone(),
            ObserverHub::new(),
            ControllerConfig::default(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, CommandError::EnvironmentNotFound { .. }));
        assert_eq!(backend.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_status_on_open_is_reported_not_fatal() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_status("{\"tilt\":");
        let hub = ObserverHub::new();
        let mut notices = hub.notices();

        let c = open_with(&backend, testing::project_with_services(&["api"]), &hub).await;
        assert_eq!(c.lifecycle().await, Lifecycle::Stopped);
        assert_poll_invariant(&c).await;
        let notice = notices.try_recv().unwrap();
        assert!(notice.message.contains("Malformed"));
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_enabled_services_never_reaches_backend() {
        let backend = Arc::new(ScriptedBackend::new());
        let hub = ObserverHub::new();
        let mut project = testing::project_with_services(&["api"]);
        if let Some(dev) = project.environments.get_mut("dev") {
            dev.services[0].enabled = false;
        }
        let c = open_with(&backend, project, &hub).await;
        let mut rx = hub.receiver();
        rx.borrow_and_update();

        let err = c.start().await.unwrap_err();
        assert!(err.is_guard());
        assert!(matches!(err, CommandError::NoEnabledServices { .. }));
        assert_eq!(backend.start_calls(), 0);
        assert_eq!(c.lifecycle().await, Lifecycle::Stopped);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn start_with_empty_service_list_is_guarded() {
        let backend = Arc::new(ScriptedBackend::new());
        let hub = ObserverHub::new();
        let c = open_with(&backend, testing::project_with_services(&[]), &hub).await;
        assert!(c.start().await.unwrap_err().is_guard());
        assert_eq!(backend.start_calls(), 0);
        assert_poll_invariant(&c).await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_then_stop_quiesces() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, hub) = open(&backend).await;

        c.start().await.unwrap();
        assert_eq!(c.lifecycle().await, Lifecycle::Running);
        assert_poll_invariant(&c).await;

        c.stop().await.unwrap();
        assert_eq!(c.lifecycle().await, Lifecycle::Stopped);
        assert_poll_invariant(&c).await;

        let mut rx = hub.receiver();
        rx.borrow_and_update();
        let polls = backend.status_calls();
        sleep(Duration::from_secs(30)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(backend.status_calls(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn start_failure_reverts_to_stopped() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.fail_next_start("tilt exited with status 1");
        let (c, _hub) = open(&backend).await;

        let err = c.start().await.unwrap_err();
        assert!(!err.is_guard());
        assert_eq!(c.lifecycle().await, Lifecycle::Stopped);
        assert_poll_invariant(&c).await;
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, _hub) = open(&backend).await;
        c.start().await.unwrap();
        let err = c.start().await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::InvalidTransition {
                command: "start",
                from: Lifecycle::Running
            }
        ));
        assert_eq!(backend.start_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_failure_reverts_to_running() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, _hub) = open(&backend).await;
        c.start().await.unwrap();
        backend.fail_next_stop("permission denied");

        assert!(c.stop().await.is_err());
        assert_eq!(c.lifecycle().await, Lifecycle::Running);
        assert_poll_invariant(&c).await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_when_stopped_is_guarded() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, _hub) = open(&backend).await;
        assert!(c.stop().await.unwrap_err().is_guard());
        assert_eq!(backend.stop_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_with_failing_stop_never_starts() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, _hub) = open(&backend).await;
        c.start().await.unwrap();
        backend.fail_next_stop("busy");

        assert!(c.restart().await.is_err());
        assert_eq!(c.lifecycle().await, Lifecycle::Running);
        assert_eq!(backend.start_calls(), 1);
        assert_poll_invariant(&c).await;
    }

    #[tokio::test(start_paused = true)]
    async fn restart_waits_settle_delay_between_steps() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, _hub) = open(&backend).await;
        c.start().await.unwrap();

        let began = Instant::now();
        c.restart().await.unwrap();
        assert!(began.elapsed() >= Duration::from_secs(1));
        assert_eq!(c.lifecycle().await, Lifecycle::Running);
        assert_eq!(backend.start_calls(), 2);
        assert_eq!(backend.stop_calls(), 1);
        let calls = backend.calls();
        let stop = calls.iter().rposition(|c| *c == "stop").unwrap();
        let start = calls.iter().rposition(|c| *c == "start").unwrap();
        assert!(stop < start);
        assert_poll_invariant(&c).await;
    }

    #[tokio::test(start_paused = true)]
    async fn restart_with_failing_start_ends_stopped() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, _hub) = open(&backend).await;
        c.start().await.unwrap();
        backend.fail_next_start("port 10350 in use");

        assert!(c.restart().await.is_err());
        assert_eq!(c.lifecycle().await, Lifecycle::Stopped);
        assert_poll_invariant(&c).await;
    }

    #[tokio::test(start_paused = true)]
    async fn restart_requires_running() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, _hub) = open(&backend).await;
        let err = c.restart().await.unwrap_err();
        assert!(err.is_guard());
        assert_eq!(backend.stop_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_discovers_url_and_notices_external_stop() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, hub) = open(&backend).await;
        c.start().await.unwrap();
        assert_eq!(hub.latest().web_ui_url, None);

        backend.set_logs([BANNER]);
        sleep(Duration::from_millis(3500)).await;
        assert_eq!(
            hub.latest().web_ui_url.as_deref(),
            Some("http://localhost:10350/")
        );

        // banner scrolls out of the window: URL is retained while running
        backend.set_logs(["api | GET /health 200"]);
        sleep(Duration::from_secs(3)).await;
        assert_eq!(
            hub.latest().web_ui_url.as_deref(),
            Some("http://localhost:10350/")
        );

        backend.set_status("stopped");
        sleep(Duration::from_secs(3)).await;
        let snap = hub.latest();
        assert_eq!(snap.lifecycle, Lifecycle::Stopped);
        assert_eq!(snap.web_ui_url, None);
        assert_poll_invariant(&c).await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_failures_do_not_stop_the_loop() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, hub) = open(&backend).await;
        c.start().await.unwrap();
        let mut notices = hub.notices();

        backend.fail_status(Some("connection refused"));
        sleep(Duration::from_millis(3500)).await;
        assert_eq!(c.lifecycle().await, Lifecycle::Running);
        assert!(notices.try_recv().is_ok());

        let before = backend.status_calls();
        sleep(Duration::from_secs(6)).await;
        assert!(backend.status_calls() >= before + 2);
        assert_eq!(c.lifecycle().await, Lifecycle::Running);
        assert_poll_invariant(&c).await;

        backend.fail_status(None);
        backend.fail_logs(Some("log file locked"));
        sleep(Duration::from_secs(3)).await;
        assert_eq!(c.lifecycle().await, Lifecycle::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cycles_do_not_overlap() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, _hub) = open(&backend).await;
        c.start().await.unwrap();
        let before = backend.status_calls();

        backend.delay_status(Duration::from_secs(5));
        sleep(Duration::from_secs(20)).await;
        // cycles begin at +3s, +11s, +19s: interval counts from completion
        let cycles = backend.status_calls() - before;
        assert!((2..=3).contains(&cycles), "cycles = {cycles}");
    }

    #[tokio::test(start_paused = true)]
    async fn close_clears_and_silences_session() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, hub) = open(&backend).await;
        c.start().await.unwrap();
        backend.delay_status(Duration::from_secs(2));
        // a status query is in flight when the session closes
        sleep(Duration::from_millis(3500)).await;

        c.close(false).await.unwrap();
        assert!(hub.latest().is_cleared());
        assert!(!c.is_polling().await);

        let mut rx = hub.receiver();
        rx.borrow_and_update();
        let polls = backend.status_calls();
        sleep(Duration::from_secs(30)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(backend.status_calls(), polls);
        assert!(matches!(c.start().await, Err(CommandError::SessionClosed)));
        assert_eq!(backend.stop_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn close_can_stop_the_tool() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, hub) = open(&backend).await;
        c.start().await.unwrap();
        c.close(true).await.unwrap();
        assert_eq!(backend.stop_calls(), 1);
        assert!(hub.latest().is_cleared());
        // second close is a no-op
        c.close(true).await.unwrap();
        assert_eq!(backend.stop_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_outliving_the_session_reports_closed() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.delay_start(Duration::from_secs(2));
        let (c, hub) = open(&backend).await;
        let c = Arc::new(c);

        let starting = tokio::spawn({
            let c = c.clone();
            async move { c.start().await }
        });
        sleep(Duration::from_millis(500)).await;
        assert_eq!(backend.start_calls(), 1);

        c.close(false).await.unwrap();
        let result = starting.await.unwrap();
        assert!(matches!(result, Err(CommandError::SessionClosed)));
        assert!(hub.latest().is_cleared());
        assert!(!c.is_polling().await);
    }

    #[tokio::test(start_paused = true)]
    async fn open_in_editor_resolves_service() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, _hub) = open(&backend).await;

        let err = c.open_in_editor("billing", None).await.unwrap_err();
        assert!(matches!(err, CommandError::ServiceNotFound { .. }));

        c.open_in_editor("api", Some("zed")).await.unwrap();
        assert_eq!(
            backend.editor_opened(),
            vec![("api".to_string(), Some("zed".to_string()))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn generate_artifacts_delegates() {
        let backend = Arc::new(ScriptedBackend::new());
        let (c, _hub) = open(&backend).await;
        c.generate_artifacts().await.unwrap();
        assert!(backend.calls().contains(&"generate_artifacts"));
    }
}
