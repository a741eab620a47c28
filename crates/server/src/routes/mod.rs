//! API route handlers for the tilt-orchestrator server.

pub mod health;
pub mod session;
pub mod stream;
pub mod tray;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - GET  /api/session - Latest snapshot and the open project's environments
/// - GET  /api/session/logs - Log window of the open session
/// - POST /api/session/open - Open a project on an environment
/// - POST /api/session/env - Switch the open project to another environment
/// - POST /api/session/close - Close the open session
/// - POST /api/session/start - Start Tilt
/// - POST /api/session/stop - Stop Tilt
/// - POST /api/session/restart - Restart Tilt
/// - POST /api/session/editor - Open a service repository in the editor
/// - POST /api/session/artifacts - Regenerate Tiltfiles (requires confirm)
/// - GET  /api/stream - SSE stream of snapshots and notices
/// - GET  /api/tray - Tray menu for the current state
/// - POST /api/tray/{item_id} - Activate a tray menu item
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", session::router())
        .nest("/api", stream::router())
        .nest("/api", tray::router())
        .with_state(state)
}
