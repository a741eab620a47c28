// crates/observability/src/lib.rs
//! Tracing subscriber setup shared by the binaries.
//!
//! `RUST_LOG` wins over the configured default filter. When a log directory is
//! given, a second layer writes plain-text logs to a daily-rolling file through
//! a non-blocking writer; the returned [`WorkerGuard`] must outlive `main`'s
//! work or buffered lines are lost.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "tilt-orchestrator.log";

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// JSON lines on stderr instead of the compact human format.
    pub json: bool,
    /// Directory for the rolling log file. `None` disables file output.
    pub log_dir: Option<PathBuf>,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json: false,
            log_dir: None,
            default_filter: "info,tower_http=warn".to_string(),
        }
    }
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let stderr = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter(&config.default_filter))
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(env_filter(&config.default_filter))
            .boxed()
    };

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(env_filter(&config.default_filter))
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr)
        .with(file)
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_quiets_request_traces() {
        let config = LogConfig::default();
        assert!(!config.json);
        assert!(config.log_dir.is_none());
        assert!(config.default_filter.contains("tower_http=warn"));
    }

    #[test]
    fn file_output_creates_directory_and_second_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");
        let config = LogConfig {
            log_dir: Some(logs.clone()),
            ..LogConfig::default()
        };
        let guard = init(&config).unwrap();
        assert!(guard.is_some());
        assert!(logs.is_dir());
        tracing::info!(test = "observability", "written to file");

        assert!(init(&LogConfig::default()).is_err());
    }
}
