// crates/server/src/routes/tray.rs
//! Tray menu endpoints.
//!
//! The desktop shell renders the menu returned by `GET /api/tray` and posts
//! the id of a clicked item back. Intents travel over the intent bus to the
//! open session's command bridge, so their failures arrive as notices on the
//! event stream rather than in this response.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tilt_orchestrator_core::{CommandError, MenuAction, TrayMenu};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct TrayActionResponse {
    pub action: String,
    /// Listeners the intent was delivered to, for intent actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TrayActionResponse {
    fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            delivered: None,
            url: None,
        }
    }
}

async fn current_menu(state: &AppState) -> TrayMenu {
    let snapshot = state.host.hub().latest();
    match state.host.current().await {
        Some(controller) => TrayMenu::build(Some(controller.project()), &snapshot),
        None => TrayMenu::build(None, &snapshot),
    }
}

/// GET /api/tray
pub async fn get_menu(State(state): State<Arc<AppState>>) -> Json<TrayMenu> {
    Json(current_menu(&state).await)
}

/// POST /api/tray/{item_id}
///
/// Only items present and enabled in the current menu can be activated.
pub async fn activate(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> ApiResult<(StatusCode, Json<TrayActionResponse>)> {
    let menu = current_menu(&state).await;
    let item = menu
        .find(&item_id)
        .ok_or_else(|| ApiError::NotFound(format!("tray item {item_id}")))?;
    if !item.is_enabled() {
        return Err(ApiError::Conflict(format!("tray item {item_id} is disabled")));
    }
    let action = MenuAction::from_id(&item_id)
        .ok_or_else(|| ApiError::BadRequest(format!("tray item {item_id} has no action")))?;

    match action {
        MenuAction::ShowUi => Ok((StatusCode::OK, Json(TrayActionResponse::new("show_ui")))),
        MenuAction::Intent(intent) => {
            let name = intent.kind().to_string();
            let delivered = state.host.bus().emit(intent);
            if delivered == 0 {
                return Err(ApiError::Command(CommandError::NoSession));
            }
            let mut body = TrayActionResponse::new(name);
            body.delivered = Some(delivered);
            Ok((StatusCode::ACCEPTED, Json(body)))
        }
        MenuAction::OpenWebUi => {
            let url = state
                .host
                .hub()
                .latest()
                .web_ui_url
                .filter(|u| !u.is_empty())
                .ok_or_else(|| ApiError::Conflict("Tilt web UI URL is not known yet".into()))?;
            open::that_detached(&url)
                .map_err(|e| ApiError::Internal(format!("opening {url}: {e}")))?;
            tracing::info!(url = %url, "opened Tilt web UI");
            let mut body = TrayActionResponse::new("open_web_ui");
            body.url = Some(url);
            Ok((StatusCode::OK, Json(body)))
        }
        MenuAction::Quit => {
            tracing::info!("quit requested from tray");
            state.shutdown.cancel();
            Ok((StatusCode::ACCEPTED, Json(TrayActionResponse::new("quit"))))
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tray", get(get_menu))
        .route("/tray/{item_id}", post(activate))
}
