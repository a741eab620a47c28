// crates/server/src/main.rs
//! tilt-orchestrator server binary.
//!
//! Loads configuration, installs logging, and serves the API on localhost
//! until ctrl-c or a tray "Quit". On the way out the open session is closed
//! without stopping Tilt, so a running environment survives a restart of the
//! app.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tilt_orchestrator_backend::TiltBackend;
use tilt_orchestrator_core::AppConfig;
use tilt_orchestrator_observability::LogConfig;
use tilt_orchestrator_server::{create_app, AppState};

#[derive(Debug, Parser)]
#[command(name = "tilt-orchestrator", version, about = "Control Tilt sessions for multi-service projects")]
struct Cli {
    /// Port to listen on (overrides config and environment).
    #[arg(long)]
    port: Option<u16>,

    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Also write daily-rolling log files into this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = tilt_orchestrator_observability::init(&LogConfig {
        json: cli.log_json,
        log_dir: cli.log_dir.clone(),
        ..LogConfig::default()
    })?;

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    tracing::debug!(?config, "configuration loaded");

    let backend = Arc::new(TiltBackend::new(config.tilt_path.clone()));
    let state = AppState::with_backend(
        backend,
        config.controller.clone(),
        Some(config.editor.clone()),
    );
    let app = create_app(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, version = env!("CARGO_PKG_VERSION"), "tilt-orchestrator listening");

    let shutdown = state.shutdown.clone();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("ctrl-c received, shutting down");
            }
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    if let Err(e) = state.host.close(false).await {
        tracing::warn!(error = %e, "closing session on shutdown failed");
    }
    tracing::info!("stopped");
    Ok(())
}
