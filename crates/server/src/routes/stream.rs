//! Server-sent events for observers of the session.
//!
//! - `GET /api/stream` -- snapshots and notices as they happen

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/stream", get(session_stream))
}

fn json_event<T: serde::Serialize>(name: &str, value: &T) -> Event {
    Event::default()
        .event(name)
        .data(serde_json::to_string(value).unwrap_or_default())
}

/// GET /api/stream -- SSE stream of session state.
///
/// # Events
///
/// | Event name  | When emitted                                        |
/// |-------------|-----------------------------------------------------|
/// | `snapshot`  | On connect, and after every published change        |
/// | `notice`    | An asynchronous failure or rejection to show a user |
/// | `heartbeat` | Every 15 seconds to keep the connection open        |
///
/// Snapshots are latest-value: a slow client may skip intermediate ones but
/// always ends on the current value. The stream ends at server shutdown.
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let hub = state.host.hub().clone();
    let mut snapshots = hub.receiver();
    let mut notices = hub.notices();
    let shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        let current = snapshots.borrow_and_update().clone();
        yield Ok(json_event("snapshot", &current));

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.reset();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = snapshots.borrow_and_update().clone();
                    yield Ok(json_event("snapshot", &current));
                }
                notice = notices.recv() => {
                    match notice {
                        Ok(notice) => yield Ok(json_event("notice", &notice)),
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "SSE client lagged behind notices");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = heartbeat.tick() => {
                    yield Ok(Event::default().event("heartbeat").data("{}"));
                }
            }
        }
    };

    Sse::new(stream)
}
