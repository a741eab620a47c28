// crates/core/src/gateway.rs
//! The boundary to whatever actually runs Tilt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tilt_orchestrator_types::{Lifecycle, Project, Service};

use crate::error::{BackendError, BackendOp};

/// Raw status payload as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
}

impl StatusReport {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }

    /// Unknown status strings are a malformed response, not a panic.
    pub fn lifecycle(&self) -> Result<Lifecycle, BackendError> {
        self.status
            .parse()
            .map_err(|e| BackendError::malformed(BackendOp::QueryStatus, format!("{e}")))
    }
}

/// The most recent fetch window of the tool's log output, oldest line first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogWindow {
    pub logs: Vec<String>,
}

/// Operations the session controller delegates to the process owner.
///
/// Every call may fail; failures come back as a typed [`BackendError`].
/// There is no restart operation: the controller composes it from `stop` and
/// `start` with a settle delay in between.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn start(&self, project: &Project, env: &str) -> Result<(), BackendError>;

    async fn stop(&self, project: &Project, env: &str) -> Result<(), BackendError>;

    async fn query_status(&self, project: &Project, env: &str)
        -> Result<StatusReport, BackendError>;

    /// `max_lines = None` returns the whole retained log.
    async fn fetch_logs(
        &self,
        project: &Project,
        env: &str,
        max_lines: Option<usize>,
    ) -> Result<LogWindow, BackendError>;

    async fn generate_artifacts(&self, project: &Project, env: &str) -> Result<(), BackendError>;

    async fn open_in_editor(
        &self,
        project: &Project,
        service: &Service,
        editor: Option<&str>,
    ) -> Result<(), BackendError>;
}
