// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use tilt_orchestrator_core::{BackendGateway, ControllerConfig, IntentBus, ObserverHub, SessionHost};
use tokio_util::sync::CancellationToken;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Owner of the open session, the observer hub and the intent bus.
    pub host: Arc<SessionHost>,
    /// Cancelled when the process should shut down (tray "Quit", ctrl-c).
    /// Open event streams end on it so graceful shutdown can finish.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(host: Arc<SessionHost>) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            host,
            shutdown: CancellationToken::new(),
        })
    }

    /// State around a fresh host for `backend`, as used by `main` and tests.
    pub fn with_backend(
        backend: Arc<dyn BackendGateway>,
        config: ControllerConfig,
        editor: Option<String>,
    ) -> Arc<Self> {
        let host = SessionHost::new(
            backend,
            ObserverHub::new(),
            IntentBus::new(),
            config,
            editor,
        );
        Self::new(Arc::new(host))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
