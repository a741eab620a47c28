// crates/core/src/error.rs
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tilt_orchestrator_types::Lifecycle;

/// The gateway operation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    Start,
    Stop,
    QueryStatus,
    FetchLogs,
    GenerateArtifacts,
    OpenInEditor,
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendOp::Start => "start",
            BackendOp::Stop => "stop",
            BackendOp::QueryStatus => "query status",
            BackendOp::FetchLogs => "fetch logs",
            BackendOp::GenerateArtifacts => "generate artifacts",
            BackendOp::OpenInEditor => "open in editor",
        };
        f.write_str(name)
    }
}

/// Errors reported by a [`crate::BackendGateway`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Tilt not found. Please install it from https://docs.tilt.dev/install.html or set the Tilt path in preferences")]
    ToolNotFound,

    #[error("Configured Tilt binary is not usable: {path}")]
    InvalidToolPath { path: PathBuf },

    #[error("Malformed response from {op}: {message}")]
    Malformed { op: BackendOp, message: String },

    #[error("IO error during {op} at {path}: {source}")]
    Io {
        op: BackendOp,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to {op}: {message}")]
    Failed { op: BackendOp, message: String },

    #[error("Environment not found: {env}")]
    EnvironmentNotFound { env: String },

    #[error("Service repository not found: {path}")]
    RepoNotFound { path: PathBuf },

    #[error("Dependency cycle between services: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },
}

impl BackendError {
    pub fn io(op: BackendOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn failed(op: BackendOp, message: impl Into<String>) -> Self {
        Self::Failed {
            op,
            message: message.into(),
        }
    }

    pub fn malformed(op: BackendOp, message: impl Into<String>) -> Self {
        Self::Malformed {
            op,
            message: message.into(),
        }
    }
}

/// Errors returned to the caller of a controller command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Add or enable at least one service to start Tilt")]
    NoEnabledServices { env: String },

    #[error("Environment not found: {env}")]
    EnvironmentNotFound { env: String },

    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    #[error("Cannot {command} while Tilt is {from}")]
    InvalidTransition {
        command: &'static str,
        from: Lifecycle,
    },

    #[error("No session is open")]
    NoSession,

    #[error("Session is closed")]
    SessionClosed,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl CommandError {
    /// Guard rejections are user errors: they never reached the backend and
    /// changed no state, so they are surfaced as information, not failures.
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            CommandError::NoEnabledServices { .. }
                | CommandError::EnvironmentNotFound { .. }
                | CommandError::ServiceNotFound { .. }
                | CommandError::InvalidTransition { .. }
        )
    }
}
