// crates/server/src/routes/session.rs
//! Session control endpoints.
//!
//! Commands run on the open session's controller and return the snapshot
//! observed once the command has finished. Guard rejections come back as 409
//! with the user-facing message; nothing reached the backend in that case.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tilt_orchestrator_core::{CommandError, SessionController};
use tilt_orchestrator_types::{ObserverSnapshot, Project};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/session body.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub snapshot: ObserverSnapshot,
    /// Environment names of the open project, sorted.
    pub environments: Vec<String>,
    pub polling: bool,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct LogsResponse {
    pub env: String,
    pub logs: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    /// Trailing lines to return; all cached lines when absent.
    pub max_lines: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    pub project: Project,
    pub env: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EnvRequest {
    pub env: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseRequest {
    #[serde(default)]
    pub stop_tilt: bool,
}

#[derive(Debug, Deserialize)]
pub struct EditorRequest {
    pub service: String,
    /// Overrides the configured editor for this call.
    pub editor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactsRequest {
    #[serde(default)]
    pub confirm: bool,
}

async fn current(state: &AppState) -> ApiResult<Arc<SessionController>> {
    state
        .host
        .current()
        .await
        .ok_or(ApiError::Command(CommandError::NoSession))
}

/// GET /api/session
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let (environments, polling) = match state.host.current().await {
        Some(controller) => (
            controller
                .project()
                .environment_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            controller.is_polling().await,
        ),
        None => (Vec::new(), false),
    };
    Json(SessionResponse {
        snapshot: state.host.hub().latest(),
        environments,
        polling,
    })
}

/// GET /api/session/logs
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<LogsResponse>> {
    let controller = current(&state).await?;
    let mut logs = controller.logs().await;
    if let Some(max) = query.max_lines {
        let skip = logs.len().saturating_sub(max);
        logs.drain(..skip);
    }
    Ok(Json(LogsResponse {
        env: controller.env().to_string(),
        logs,
    }))
}

/// POST /api/session/open
pub async fn open_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenRequest>,
) -> ApiResult<Json<ObserverSnapshot>> {
    tracing::info!(project = %req.project.name(), env = ?req.env, "opening project");
    Ok(Json(state.host.open(req.project, req.env).await?))
}

/// POST /api/session/env
pub async fn switch_env(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnvRequest>,
) -> ApiResult<Json<ObserverSnapshot>> {
    if req.env.trim().is_empty() {
        return Err(ApiError::BadRequest("env must not be empty".into()));
    }
    Ok(Json(state.host.switch_env(&req.env).await?))
}

/// POST /api/session/close
///
/// The body is optional; without one the running tool is left alone.
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    req: Option<Json<CloseRequest>>,
) -> ApiResult<Json<ObserverSnapshot>> {
    let Json(req) = req.unwrap_or_default();
    state.host.close(req.stop_tilt).await?;
    Ok(Json(state.host.hub().latest()))
}

/// POST /api/session/start
pub async fn start(State(state): State<Arc<AppState>>) -> ApiResult<Json<ObserverSnapshot>> {
    let controller = current(&state).await?;
    controller.start().await?;
    Ok(Json(controller.snapshot().await))
}

/// POST /api/session/stop
pub async fn stop(State(state): State<Arc<AppState>>) -> ApiResult<Json<ObserverSnapshot>> {
    let controller = current(&state).await?;
    controller.stop().await?;
    Ok(Json(controller.snapshot().await))
}

/// POST /api/session/restart
pub async fn restart(State(state): State<Arc<AppState>>) -> ApiResult<Json<ObserverSnapshot>> {
    let controller = current(&state).await?;
    controller.restart().await?;
    Ok(Json(controller.snapshot().await))
}

/// POST /api/session/editor
pub async fn open_in_editor(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EditorRequest>,
) -> ApiResult<StatusCode> {
    let controller = current(&state).await?;
    let editor = req.editor.as_deref().or(state.host.editor());
    controller.open_in_editor(&req.service, editor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/session/artifacts
///
/// Regeneration overwrites the environment's Tiltfiles, so the caller has to
/// say so explicitly.
pub async fn generate_artifacts(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ArtifactsRequest>,
) -> ApiResult<StatusCode> {
    if !req.confirm {
        return Err(ApiError::BadRequest(
            "regenerating overwrites the generated Tiltfiles; resend with confirm: true".into(),
        ));
    }
    let controller = current(&state).await?;
    controller.generate_artifacts().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the session routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/logs", get(get_logs))
        .route("/session/open", post(open_session))
        .route("/session/env", post(switch_env))
        .route("/session/close", post(close_session))
        .route("/session/start", post(start))
        .route("/session/stop", post(stop))
        .route("/session/restart", post(restart))
        .route("/session/editor", post(open_in_editor))
        .route("/session/artifacts", post(generate_artifacts))
}
