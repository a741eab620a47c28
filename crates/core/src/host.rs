// crates/core/src/host.rs
//! Owner of the one active session and its command bridge.

use std::sync::Arc;

use tilt_orchestrator_types::{ObserverSnapshot, Project};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::bridge::{CommandBridge, IntentBus};
use crate::config::ControllerConfig;
use crate::controller::SessionController;
use crate::error::CommandError;
use crate::gateway::BackendGateway;
use crate::hub::ObserverHub;

struct ActiveSession {
    controller: Arc<SessionController>,
    bridge: CommandBridge,
}

impl ActiveSession {
    /// Listeners go first so no intent can reach the controller once its
    /// teardown has begun.
    async fn teardown(self, stop_tool: bool) -> Result<(), CommandError> {
        self.bridge.unbind().await;
        self.controller.close(stop_tool).await
    }
}

pub struct SessionHost {
    backend: Arc<dyn BackendGateway>,
    hub: ObserverHub,
    bus: IntentBus,
    config: ControllerConfig,
    editor: Option<String>,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionHost {
    pub fn new(
        backend: Arc<dyn BackendGateway>,
        hub: ObserverHub,
        bus: IntentBus,
        config: ControllerConfig,
        editor: Option<String>,
    ) -> Self {
        Self {
            backend,
            hub,
            bus,
            config,
            editor,
            active: Mutex::new(None),
        }
    }

    pub fn hub(&self) -> &ObserverHub {
        &self.hub
    }

    pub fn bus(&self) -> &IntentBus {
        &self.bus
    }

    pub fn editor(&self) -> Option<&str> {
        self.editor.as_deref()
    }

    /// The controller of the open session, if any.
    pub async fn current(&self) -> Option<Arc<SessionController>> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| a.controller.clone())
    }

    /// Open `project` on `env` (or its default environment), replacing any
    /// open session. The running tool of a replaced session is left alone.
    pub async fn open(
        &self,
        project: Project,
        env: Option<String>,
    ) -> Result<ObserverSnapshot, CommandError> {
        let env = match env {
            Some(env) => env,
            None => project
                .default_environment()
                .map(str::to_string)
                .ok_or_else(|| CommandError::EnvironmentNotFound {
                    env: String::new(),
                })?,
        };
        if project.environment(&env).is_none() {
            return Err(CommandError::EnvironmentNotFound { env });
        }

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            if let Err(e) = previous.teardown(false).await {
                warn!(error = %e, "closing previous session failed");
            }
        }
        let session = self.activate(project, env).await?;
        let snapshot = session.controller.snapshot().await;
        *active = Some(session);
        Ok(snapshot)
    }

    /// Re-home onto another environment of the open project. The old
    /// session's listeners and poll loop are gone before the new session
    /// exists. Unknown environments are rejected without touching the
    /// current session.
    pub async fn switch_env(&self, env: &str) -> Result<ObserverSnapshot, CommandError> {
        let mut active = self.active.lock().await;
        let current = active.as_ref().ok_or(CommandError::NoSession)?;
        if current.controller.env() == env {
            return Ok(current.controller.snapshot().await);
        }
        let project = current.controller.project().clone();
        if project.environment(env).is_none() {
            return Err(CommandError::EnvironmentNotFound {
                env: env.to_string(),
            });
        }

        if let Some(previous) = active.take() {
            info!(from = %previous.controller.env(), to = %env, "switching environment");
            if let Err(e) = previous.teardown(false).await {
                warn!(error = %e, "closing previous session failed");
            }
        }
        let session = self.activate(project, env.to_string()).await?;
        let snapshot = session.controller.snapshot().await;
        *active = Some(session);
        Ok(snapshot)
    }

    /// Close the open session, optionally stopping a running tool first.
    /// Observers end on the cleared snapshot either way.
    pub async fn close(&self, stop_tool: bool) -> Result<(), CommandError> {
        let previous = self.active.lock().await.take();
        let result = match previous {
            Some(session) => session.teardown(stop_tool).await,
            None => Ok(()),
        };
        self.hub.clear();
        result
    }

    async fn activate(&self, project: Project, env: String) -> Result<ActiveSession, CommandError> {
        let controller = Arc::new(
            SessionController::open(
                project,
                env,
                self.backend.clone(),
                self.hub.clone(),
                self.config.clone(),
            )
            .await?,
        );
        let bridge = CommandBridge::bind(&self.bus, controller.clone(), self.editor.clone());
        Ok(ActiveSession { controller, bridge })
    }
}
