// crates/core/src/config.rs
//! Application configuration.
//!
//! Resolution order (later wins):
//! 1. Built-in defaults
//! 2. `config.toml` (explicit path, or `<config_dir>/tilt-orchestrator/config.toml`)
//! 3. Environment variables (`TILT_ORCHESTRATOR_PORT` / `PORT`, `TILT_PATH`,
//!    `TILT_ORCHESTRATOR_EDITOR`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 47350;
pub const DEFAULT_EDITOR: &str = "code";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("IO error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    /// Explicit Tilt binary. When unset the binary is looked up on `PATH`.
    pub tilt_path: Option<PathBuf>,
    /// Command used to open service repositories.
    pub editor: String,
    pub controller: ControllerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            tilt_path: None,
            editor: DEFAULT_EDITOR.to_string(),
            controller: ControllerConfig::default(),
        }
    }
}

/// Timing and sizing knobs for a session controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Delay between the end of one reconciliation cycle and the next.
    pub poll_interval_ms: u64,
    /// Pause between the stop and start halves of a restart.
    pub settle_delay_ms: u64,
    /// Number of trailing log lines fetched per cycle.
    pub log_window: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            settle_delay_ms: 1000,
            log_window: 500,
        }
    }
}

impl ControllerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// `<config_dir>/tilt-orchestrator/config.toml`, if a config dir exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tilt-orchestrator").join("config.toml"))
}

impl AppConfig {
    /// Load from `path` (must exist) or from the default location (optional),
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                Self::from_file(path)?
            }
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from an environment lookup. Unparseable values are
    /// ignored and the previous value kept.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("TILT_ORCHESTRATOR_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|p| p.parse().ok())
        {
            self.port = port;
        }
        if let Some(path) = lookup("TILT_PATH").filter(|p| !p.trim().is_empty()) {
            self.tilt_path = Some(PathBuf::from(path));
        }
        if let Some(editor) = lookup("TILT_ORCHESTRATOR_EDITOR").filter(|e| !e.trim().is_empty()) {
            self.editor = editor;
        }
    }
}
