// crates/backend/src/tilt.rs
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tilt_orchestrator_core::{BackendError, BackendGateway, BackendOp, LogWindow, StatusReport};
use tilt_orchestrator_types::{Project, Service};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use which::which;

use crate::generator;
use crate::process::{self, KillOutcome};
use crate::runtime::{self, RuntimeState};

const DEFAULT_EDITOR: &str = "code";

/// Runs the `tilt` CLI as a child process per environment.
#[derive(Debug, Clone, Default)]
pub struct TiltBackend {
    /// Explicit binary; validated with `tilt version` before use.
    tilt_path: Option<PathBuf>,
}

impl TiltBackend {
    pub fn new(tilt_path: Option<PathBuf>) -> Self {
        Self { tilt_path }
    }

    async fn resolve_binary(&self) -> Result<PathBuf, BackendError> {
        match &self.tilt_path {
            Some(path) => {
                if tool_version(path).await.is_some() {
                    Ok(path.clone())
                } else {
                    Err(BackendError::InvalidToolPath { path: path.clone() })
                }
            }
            None => which("tilt").map_err(|_| BackendError::ToolNotFound),
        }
    }
}

/// Trimmed output of `<path> version` (stdout, else stderr), if it ran.
async fn tool_version(path: &Path) -> Option<String> {
    let output = Command::new(path)
        .arg("version")
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let version = if stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).trim().to_string()
    } else {
        stdout
    };
    (!version.is_empty()).then_some(version)
}

/// Append each line of `stream` to the log file until the stream closes.
async fn pump<R>(stream: R, log: PathBuf)
where
    R: AsyncRead + Unpin,
{
    let mut file = match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %log.display(), error = %e, "cannot open tilt log");
            return;
        }
    };
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut buf = line.into_bytes();
        buf.push(b'\n');
        if file.write_all(&buf).await.is_err() {
            break;
        }
    }
}

fn workspace(project: &Project) -> &Path {
    Path::new(project.workspace_path())
}

#[async_trait]
impl BackendGateway for TiltBackend {
    async fn start(&self, project: &Project, env: &str) -> Result<(), BackendError> {
        let ws = workspace(project);
        let state = runtime::read_state(ws, env).await;
        if let (Some(pid), "running" | "starting") = (state.tilt.pid, state.tilt.status.as_str()) {
            if process::is_alive(pid).await {
                debug!(env, pid, "tilt already running");
                return Ok(());
            }
        }

        let binary = self.resolve_binary().await?;
        let tiltfile = Path::new("tilt").join(env).join("Tiltfile");
        let log = runtime::log_path(ws, env);
        if let Some(dir) = log.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| BackendError::io(BackendOp::Start, dir, e))?;
        }
        tokio::fs::File::create(&log)
            .await
            .map_err(|e| BackendError::io(BackendOp::Start, &log, e))?;

        let mut child = Command::new(&binary)
            .arg("up")
            .arg("-f")
            .arg(&tiltfile)
            .current_dir(ws)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::failed(BackendOp::Start, format!("spawn {}: {e}", binary.display())))?;
        let pid = child.id().ok_or_else(|| {
            BackendError::failed(BackendOp::Start, "tilt exited before it could be tracked")
        })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, log.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, log.clone()));
        }
        let reaped_env = env.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!(env = %reaped_env, pid, %status, "tilt exited"),
                Err(e) => warn!(env = %reaped_env, pid, error = %e, "waiting for tilt failed"),
            }
        });

        runtime::write_state(ws, env, &RuntimeState::starting(pid), BackendOp::Start).await?;
        info!(env, pid, tiltfile = %tiltfile.display(), "tilt spawned");
        Ok(())
    }

    async fn stop(&self, project: &Project, env: &str) -> Result<(), BackendError> {
        let ws = workspace(project);
        let state = runtime::read_state(ws, env).await;
        let Some(pid) = state.tilt.pid else {
            return Ok(());
        };
        match process::kill(pid).await {
            KillOutcome::Killed => {}
            KillOutcome::Gone => debug!(env, pid, "tilt process already gone"),
            KillOutcome::Survived => {
                warn!(env, pid, "tilt process survived the kill");
                return Err(BackendError::failed(
                    BackendOp::Stop,
                    format!("tilt (pid {pid}) could not be terminated"),
                ));
            }
        }
        runtime::write_state(ws, env, &RuntimeState::stopped(), BackendOp::Stop).await?;
        info!(env, pid, "tilt stopped");
        Ok(())
    }

    async fn query_status(&self, project: &Project, env: &str) -> Result<StatusReport, BackendError> {
        let ws = workspace(project);
        let mut state = runtime::read_state(ws, env).await;
        let alive = match state.tilt.pid {
            Some(pid) => process::is_alive(pid).await,
            None => false,
        };
        let status = if alive { "running" } else { "stopped" };
        if state.tilt.status != status {
            state.tilt.status = status.to_string();
            runtime::write_state(ws, env, &state, BackendOp::QueryStatus).await?;
        }
        Ok(StatusReport::new(status))
    }

    async fn fetch_logs(
        &self,
        project: &Project,
        env: &str,
        max_lines: Option<usize>,
    ) -> Result<LogWindow, BackendError> {
        let logs = runtime::tail_log(workspace(project), env, max_lines).await?;
        Ok(LogWindow { logs })
    }

    async fn generate_artifacts(&self, project: &Project, env: &str) -> Result<(), BackendError> {
        let written = generator::generate(project, env).await?;
        info!(env, files = written.len(), "tiltfiles written");
        Ok(())
    }

    async fn open_in_editor(
        &self,
        project: &Project,
        service: &Service,
        editor: Option<&str>,
    ) -> Result<(), BackendError> {
        let dir = workspace(project)
            .join(project.services_path())
            .join(service.repo_dir());
        if !dir.is_dir() {
            return Err(BackendError::RepoNotFound { path: dir });
        }
        let editor = editor.unwrap_or(DEFAULT_EDITOR);
        let mut child = Command::new(editor)
            .arg(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                BackendError::failed(BackendOp::OpenInEditor, format!("launch {editor}: {e}"))
            })?;
        tokio::spawn(async move {
            let _ = child.wait().await;
        });
        info!(service = %service.name, editor, path = %dir.display(), "opened in editor");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tilt_orchestrator_core::testing;

    fn project_in(dir: &Path) -> Project {
        let mut project = testing::project_with_services(&["api"]);
        project.project.workspace_path = dir.to_string_lossy().into_owned();
        project
    }

    #[tokio::test]
    async fn status_without_state_is_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TiltBackend::default();
        let report = backend.query_status(&project_in(dir.path()), "dev").await.unwrap();
        assert_eq!(report.status, "stopped");
        // unchanged status: nothing written
        assert!(!runtime::runtime_path(dir.path(), "dev").exists());
    }

    #[tokio::test]
    async fn dead_pid_reconciles_to_stopped() {
        let dir = tempfile::tempdir().unwrap();
        runtime::write_state(
            dir.path(),
            "dev",
            &RuntimeState::starting(4_000_000_000),
            BackendOp::Start,
        )
        .await
        .unwrap();

        let backend = TiltBackend::default();
        let report = backend.query_status(&project_in(dir.path()), "dev").await.unwrap();
        assert_eq!(report.status, "stopped");
        assert_eq!(
            runtime::read_state(dir.path(), "dev").await.tilt.status,
            "stopped"
        );
    }

    #[tokio::test]
    async fn live_pid_reports_running() {
        let dir = tempfile::tempdir().unwrap();
        runtime::write_state(
            dir.path(),
            "dev",
            &RuntimeState::starting(std::process::id()),
            BackendOp::Start,
        )
        .await
        .unwrap();
        let backend = TiltBackend::default();
        let report = backend.query_status(&project_in(dir.path()), "dev").await.unwrap();
        assert_eq!(report.status, "running");
    }

    #[tokio::test]
    async fn invalid_configured_binary() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TiltBackend::new(Some(dir.path().join("no-such-tilt")));
        let err = backend.start(&project_in(dir.path()), "dev").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidToolPath { .. }));
        assert!(!runtime::runtime_path(dir.path(), "dev").exists());
    }

    #[tokio::test]
    async fn stop_without_pid_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TiltBackend::default();
        backend.stop(&project_in(dir.path()), "dev").await.unwrap();
        assert!(!runtime::runtime_path(dir.path(), "dev").exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn stop_keeps_state_when_the_process_survives() {
        let dir = tempfile::tempdir().unwrap();
        runtime::write_state(dir.path(), "dev", &RuntimeState::starting(1), BackendOp::Start)
            .await
            .unwrap();

        let err = TiltBackend::default()
            .stop(&project_in(dir.path()), "dev")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Failed { op: BackendOp::Stop, .. }));
        assert_eq!(
            runtime::read_state(dir.path(), "dev").await,
            RuntimeState::starting(1)
        );
    }

    #[tokio::test]
    async fn editor_requires_repo_directory() {
        let dir = tempfile::tempdir().unwrap();
        let project = project_in(dir.path());
        let service = testing::service("api", true);
        let err = TiltBackend::default()
            .open_in_editor(&project, &service, Some("true"))
            .await
            .unwrap_err();
        match err {
            BackendError::RepoNotFound { path } => {
                assert_eq!(path, dir.path().join("repos").join("api"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
