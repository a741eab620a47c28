// crates/core/src/testing.rs
//! In-memory gateway and fixtures for controller tests.
//!
//! `ScriptedBackend` behaves like a well-mannered Tilt: a successful start
//! makes status report `running`, a successful stop makes it `stopped`.
//! Failures and delays are injected per call.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tilt_orchestrator_types::{
    Environment, Project, ProjectInfo, Service, TiltMode, TiltSettings,
};

use crate::error::{BackendError, BackendOp};
use crate::gateway::{BackendGateway, LogWindow, StatusReport};

#[derive(Debug, Default)]
struct Script {
    status: String,
    logs: Vec<String>,
    fail_start: Option<String>,
    fail_stop: Option<String>,
    fail_status: Option<String>,
    fail_logs: Option<String>,
    status_delay: Option<Duration>,
    start_delay: Option<Duration>,
    calls: Vec<&'static str>,
    editor_opened: Vec<(String, Option<String>)>,
}

#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                status: "stopped".into(),
                ..Script::default()
            }),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_status(&self, status: &str) {
        self.script().status = status.to_string();
    }

    pub fn set_logs<S: Into<String>>(&self, logs: impl IntoIterator<Item = S>) {
        self.script().logs = logs.into_iter().map(Into::into).collect();
    }

    pub fn fail_next_start(&self, message: &str) {
        self.script().fail_start = Some(message.to_string());
    }

    pub fn fail_next_stop(&self, message: &str) {
        self.script().fail_stop = Some(message.to_string());
    }

    /// Every status query fails until cleared with `None`.
    pub fn fail_status(&self, message: Option<&str>) {
        self.script().fail_status = message.map(str::to_string);
    }

    /// Every log fetch fails until cleared with `None`.
    pub fn fail_logs(&self, message: Option<&str>) {
        self.script().fail_logs = message.map(str::to_string);
    }

    pub fn delay_status(&self, delay: Duration) {
        self.script().status_delay = Some(delay);
    }

    pub fn delay_start(&self, delay: Duration) {
        self.script().start_delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.script().calls.clone()
    }

    fn count(&self, name: &str) -> usize {
        self.script().calls.iter().filter(|c| **c == name).count()
    }

    pub fn start_calls(&self) -> usize {
        self.count("start")
    }

    pub fn stop_calls(&self) -> usize {
        self.count("stop")
    }

    pub fn status_calls(&self) -> usize {
        self.count("query_status")
    }

    pub fn log_calls(&self) -> usize {
        self.count("fetch_logs")
    }

    pub fn editor_opened(&self) -> Vec<(String, Option<String>)> {
        self.script().editor_opened.clone()
    }
}

#[async_trait]
impl BackendGateway for ScriptedBackend {
    async fn start(&self, _project: &Project, _env: &str) -> Result<(), BackendError> {
        let delay = {
            let mut s = self.script();
            s.calls.push("start");
            s.start_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut s = self.script();
        if let Some(message) = s.fail_start.take() {
            return Err(BackendError::failed(BackendOp::Start, message));
        }
        s.status = "running".into();
        Ok(())
    }

    async fn stop(&self, _project: &Project, _env: &str) -> Result<(), BackendError> {
        let mut s = self.script();
        s.calls.push("stop");
        if let Some(message) = s.fail_stop.take() {
            return Err(BackendError::failed(BackendOp::Stop, message));
        }
        s.status = "stopped".into();
        Ok(())
    }

    async fn query_status(
        &self,
        _project: &Project,
        _env: &str,
    ) -> Result<StatusReport, BackendError> {
        let delay = {
            let mut s = self.script();
            s.calls.push("query_status");
            s.status_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let s = self.script();
        match &s.fail_status {
            Some(message) => Err(BackendError::failed(BackendOp::QueryStatus, message.clone())),
            None => Ok(StatusReport::new(s.status.clone())),
        }
    }

    async fn fetch_logs(
        &self,
        _project: &Project,
        _env: &str,
        max_lines: Option<usize>,
    ) -> Result<LogWindow, BackendError> {
        let mut s = self.script();
        s.calls.push("fetch_logs");
        if let Some(message) = &s.fail_logs {
            return Err(BackendError::failed(BackendOp::FetchLogs, message.clone()));
        }
        let skip = max_lines
            .map(|n| s.logs.len().saturating_sub(n))
            .unwrap_or(0);
        Ok(LogWindow {
            logs: s.logs[skip..].to_vec(),
        })
    }

    async fn generate_artifacts(&self, _project: &Project, _env: &str) -> Result<(), BackendError> {
        self.script().calls.push("generate_artifacts");
        Ok(())
    }

    async fn open_in_editor(
        &self,
        _project: &Project,
        service: &Service,
        editor: Option<&str>,
    ) -> Result<(), BackendError> {
        let mut s = self.script();
        s.calls.push("open_in_editor");
        s.editor_opened
            .push((service.name.clone(), editor.map(str::to_string)));
        Ok(())
    }
}

pub fn service(name: &str, enabled: bool) -> Service {
    Service {
        name: name.to_string(),
        path: None,
        port: 8080,
        enabled,
        repo: None,
        docker: None,
        k8s: None,
        env: None,
        depends_on: None,
        helm: None,
        kustomize: None,
    }
}

/// Project "shop" with environments `dev` (the given services, all enabled)
/// and `prod` (same services).
pub fn project_with_services(names: &[&str]) -> Project {
    let services: Vec<Service> = names.iter().map(|n| service(n, true)).collect();
    let environments: HashMap<String, Environment> = ["dev", "prod"]
        .into_iter()
        .map(|env| {
            (
                env.to_string(),
                Environment {
                    shared_env: HashMap::new(),
                    services: services.clone(),
                },
            )
        })
        .collect();
    Project {
        project: ProjectInfo {
            name: "shop".into(),
            workspace_path: "/work/shop".into(),
            tilt: TiltSettings {
                mode: TiltMode::Root,
            },
            services_path: None,
        },
        environments,
    }
}
