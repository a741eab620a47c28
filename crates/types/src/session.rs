// crates/types/src/session.rs
//! Lifecycle and observer snapshot types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Run state of the Tilt process as tracked by a session controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl Lifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Stopped => "stopped",
            Lifecycle::Starting => "starting",
            Lifecycle::Running => "running",
            Lifecycle::Stopping => "stopping",
        }
    }

    /// Anything but `Stopped` keeps a reconciliation loop alive.
    pub fn is_active(self) -> bool {
        self != Lifecycle::Stopped
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lifecycle status: {0:?}")]
pub struct ParseLifecycleError(pub String);

impl FromStr for Lifecycle {
    type Err = ParseLifecycleError;

    /// Accepts the status strings reported by the backend, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stopped" => Ok(Lifecycle::Stopped),
            "starting" => Ok(Lifecycle::Starting),
            "running" => Ok(Lifecycle::Running),
            "stopping" => Ok(Lifecycle::Stopping),
            _ => Err(ParseLifecycleError(s.to_string())),
        }
    }
}

/// Immutable projection of a session pushed to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct ObserverSnapshot {
    pub project: Option<String>,
    pub env: Option<String>,
    pub lifecycle: Lifecycle,
    #[serde(rename = "webUIURL")]
    pub web_ui_url: Option<String>,
}

impl ObserverSnapshot {
    /// Snapshot published when a session is torn down: no project, stopped.
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn is_cleared(&self) -> bool {
        self.project.is_none() && self.lifecycle == Lifecycle::Stopped
    }

    pub fn tray_state(&self) -> TrayTiltState {
        TrayTiltState {
            status: self.lifecycle.as_str().to_string(),
            is_running: self.lifecycle == Lifecycle::Running,
            web_ui_url: self.web_ui_url.clone(),
        }
    }
}

/// What the tray indicator renders for the Tilt process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct TrayTiltState {
    pub status: String,
    pub is_running: bool,
    pub web_ui_url: Option<String>,
}
