// crates/server/src/routes/health.rs
//! Liveness plus a one-line view of what the server is controlling.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tilt_orchestrator_types::Lifecycle;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Name of the open project, if any.
    pub project: Option<String>,
    pub env: Option<String>,
    pub tilt: Lifecycle,
}

/// GET /api/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.host.hub().latest();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        project: snapshot.project,
        env: snapshot.env,
        tilt: snapshot.lifecycle,
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
