// crates/backend/src/runtime.rs
//! On-disk runtime state of a Tilt process.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tilt_orchestrator_core::{BackendError, BackendOp};
use tracing::debug;

pub const TOOLING_DIR: &str = ".tooling";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiltState {
    pub status: String,
    #[serde(default)]
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub tilt: TiltState,
}

impl RuntimeState {
    pub fn stopped() -> Self {
        Self {
            tilt: TiltState {
                status: "stopped".into(),
                pid: None,
            },
        }
    }

    pub fn starting(pid: u32) -> Self {
        Self {
            tilt: TiltState {
                status: "starting".into(),
                pid: Some(pid),
            },
        }
    }
}

pub fn runtime_path(workspace: &Path, env: &str) -> PathBuf {
    workspace.join(TOOLING_DIR).join(format!("{env}_runtime.json"))
}

pub fn log_path(workspace: &Path, env: &str) -> PathBuf {
    workspace.join(TOOLING_DIR).join(format!("{env}_tilt.log"))
}

/// Missing or unreadable state means nothing was started.
pub async fn read_state(workspace: &Path, env: &str) -> RuntimeState {
    let path = runtime_path(workspace, env);
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(_) => return RuntimeState::stopped(),
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        debug!(path = %path.display(), error = %e, "unreadable runtime state, assuming stopped");
        RuntimeState::stopped()
    })
}

pub async fn write_state(
    workspace: &Path,
    env: &str,
    state: &RuntimeState,
    op: BackendOp,
) -> Result<(), BackendError> {
    let dir = workspace.join(TOOLING_DIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| BackendError::io(op, &dir, e))?;
    let path = runtime_path(workspace, env);
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| BackendError::failed(op, format!("serialize runtime state: {e}")))?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| BackendError::io(op, &path, e))
}

/// The last `max_lines` lines of the log, or all of it. A log that does not
/// exist yet is empty.
pub async fn tail_log(
    workspace: &Path,
    env: &str,
    max_lines: Option<usize>,
) -> Result<Vec<String>, BackendError> {
    let path = log_path(workspace, env);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BackendError::io(BackendOp::FetchLogs, &path, e)),
    };
    let content = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = content.lines().collect();
    let start = max_lines
        .map(|n| lines.len().saturating_sub(n))
        .unwrap_or(0);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}
