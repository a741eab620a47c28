// crates/core/src/bridge.rs
//! Named intents from the tray, menus or frontend, routed to the current
//! session controller.
//!
//! [`IntentBus`] is the registry intents are raised on. A [`CommandBridge`]
//! registers one listener per intent kind for a single controller and owns
//! the returned [`Unlisten`] handles; switching environments unbinds the old
//! bridge completely before the next one is bound.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tilt_orchestrator_types::{Intent, IntentKind, Notice};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::SessionController;
use crate::error::CommandError;

type Handler = Arc<dyn Fn(Intent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    by_id: HashMap<u64, (IntentKind, Handler)>,
}

/// Registry of intent listeners.
#[derive(Clone, Default)]
pub struct IntentBus {
    listeners: Arc<Mutex<Listeners>>,
    next_id: Arc<AtomicU64>,
}

impl IntentBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `handler` for intents of `kind`.
    pub fn on<F>(&self, kind: IntentKind, handler: F) -> Unlisten
    where
        F: Fn(Intent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners().by_id.insert(id, (kind, Arc::new(handler)));
        Unlisten {
            listeners: Arc::downgrade(&self.listeners),
            id,
        }
    }

    /// Deliver `intent` to every listener for its kind. Returns how many
    /// listeners received it.
    pub fn emit(&self, intent: Intent) -> usize {
        let kind = intent.kind();
        let handlers: Vec<Handler> = self
            .listeners()
            .by_id
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, h)| h.clone())
            .collect();
        if handlers.is_empty() {
            debug!(intent = %kind, "intent raised with no listener");
        }
        for handler in &handlers {
            handler(intent.clone());
        }
        handlers.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().by_id.len()
    }
}

/// Deregisters a listener when consumed or dropped. Removing an already
/// removed listener is a no-op.
pub struct Unlisten {
    listeners: Weak<Mutex<Listeners>>,
    id: u64,
}

impl Unlisten {
    pub fn unlisten(self) {
        // Drop does the work
    }
}

impl Drop for Unlisten {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .by_id
                .remove(&self.id);
        }
    }
}

// =============================================================================
// CommandBridge
// =============================================================================

/// Listeners for one controller plus the task that runs their intents.
///
/// Intents are executed one at a time, in arrival order. Unbinding stops
/// accepting intents immediately and waits for the one being executed.
pub struct CommandBridge {
    handles: Vec<Unlisten>,
    token: CancellationToken,
    dispatcher: Option<JoinHandle<()>>,
    env: String,
}

impl CommandBridge {
    pub fn bind(
        bus: &IntentBus,
        controller: Arc<SessionController>,
        editor: Option<String>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let env = controller.env().to_string();

        let handles = IntentKind::ALL
            .into_iter()
            .map(|kind| {
                let tx = tx.clone();
                let token = token.clone();
                bus.on(kind, move |intent| {
                    if token.is_cancelled() {
                        return;
                    }
                    let _ = tx.send(intent);
                })
            })
            .collect();

        let dispatcher = tokio::spawn(dispatch(rx, controller, editor, token.clone()));
        info!(env = %env, "command bridge bound");
        Self {
            handles,
            token,
            dispatcher: Some(dispatcher),
            env,
        }
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    /// Remove every listener, then wait for the intent in progress (if any).
    /// Queued intents that have not started are dropped.
    pub async fn unbind(mut self) {
        self.token.cancel();
        for handle in self.handles.drain(..) {
            handle.unlisten();
        }
        if let Some(task) = self.dispatcher.take() {
            let _ = task.await;
        }
        info!(env = %self.env, "command bridge unbound");
    }
}

impl Drop for CommandBridge {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<Intent>,
    controller: Arc<SessionController>,
    editor: Option<String>,
    token: CancellationToken,
) {
    loop {
        let intent = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            intent = rx.recv() => match intent {
                Some(intent) => intent,
                None => break,
            },
        };
        if token.is_cancelled() {
            break;
        }
        debug!(env = %controller.env(), intent = %intent.kind(), "dispatching intent");
        let result = match &intent {
            Intent::Start => controller.start().await,
            Intent::Stop => controller.stop().await,
            Intent::Restart => controller.restart().await,
            Intent::OpenInEditor { service } => {
                controller.open_in_editor(service, editor.as_deref()).await
            }
        };
        if let Err(e) = result {
            surface(&controller, &intent, &e);
        }
    }
}

fn surface(controller: &SessionController, intent: &Intent, error: &CommandError) {
    let title = match intent {
        Intent::Start => "Failed to start Tilt",
        Intent::Stop => "Failed to stop Tilt",
        Intent::Restart => "Failed to restart Tilt",
        Intent::OpenInEditor { .. } => "Failed to open editor",
    };
    if error.is_guard() {
        info!(env = %controller.env(), intent = %intent.kind(), error = %error, "intent rejected");
        controller
            .hub()
            .notify(Notice::info(title, error.to_string()));
    } else {
        warn!(env = %controller.env(), intent = %intent.kind(), error = %error, "intent failed");
        controller
            .hub()
            .notify(Notice::error(title, error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::hub::ObserverHub;
    use crate::testing::{self, ScriptedBackend};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tilt_orchestrator_types::{Lifecycle, NoticeLevel};

    #[test]
    fn unlisten_is_idempotent() {
        let bus = IntentBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handle = bus.on(IntentKind::Start, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.emit(Intent::Start), 1);
        assert_eq!(bus.emit(Intent::Stop), 0);

        handle.unlisten();
        assert_eq!(bus.emit(Intent::Start), 0);
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handle_outliving_bus_is_harmless() {
        let bus = IntentBus::new();
        let handle = bus.on(IntentKind::Stop, |_| {});
        drop(bus);
        drop(handle);
    }

    async fn controller(
        backend: &Arc<ScriptedBackend>,
        hub: &ObserverHub,
        env: &str,
    ) -> Arc<SessionController> {
        Arc::new(
            SessionController::open(
                testing::project_with_services(&["api"]),
                env,
                backend.clone(),
                hub.clone(),
                ControllerConfig::default(),
            )
            .await
            .unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn intents_drive_the_controller() {
        let backend = Arc::new(ScriptedBackend::new());
        let hub = ObserverHub::new();
        let bus = IntentBus::new();
        let c = controller(&backend, &hub, "dev").await;
        let bridge = CommandBridge::bind(&bus, c.clone(), Some("zed".into()));
        assert_eq!(bus.listener_count(), IntentKind::ALL.len());

        assert_eq!(bus.emit(Intent::Start), 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(c.lifecycle().await, Lifecycle::Running);

        bus.emit(Intent::OpenInEditor {
            service: "api".into(),
        });
        bus.emit(Intent::Restart);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(backend.start_calls(), 2);
        assert_eq!(
            backend.editor_opened(),
            vec![("api".to_string(), Some("zed".to_string()))]
        );

        bridge.unbind().await;
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn guard_rejections_become_info_notices() {
        let backend = Arc::new(ScriptedBackend::new());
        let hub = ObserverHub::new();
        let bus = IntentBus::new();
        let mut notices = hub.notices();
        let c = controller(&backend, &hub, "dev").await;
        let _bridge = CommandBridge::bind(&bus, c, None);

        bus.emit(Intent::Stop);
        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Info);
        assert_eq!(notice.title, "Failed to stop Tilt");
        assert_eq!(backend.stop_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failures_become_error_notices() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.fail_next_start("tilt: command not found");
        let hub = ObserverHub::new();
        let bus = IntentBus::new();
        let mut notices = hub.notices();
        let c = controller(&backend, &hub, "dev").await;
        let _bridge = CommandBridge::bind(&bus, c, None);

        bus.emit(Intent::Start);
        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("command not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn rebinding_never_reaches_the_old_session() {
        let backend = Arc::new(ScriptedBackend::new());
        let hub = ObserverHub::new();
        let bus = IntentBus::new();

        let dev = controller(&backend, &hub, "dev").await;
        let bridge = CommandBridge::bind(&bus, dev.clone(), None);
        bridge.unbind().await;
        dev.close(false).await.unwrap();

        let prod = controller(&backend, &hub, "prod").await;
        let _bridge = CommandBridge::bind(&bus, prod.clone(), None);
        assert_eq!(bus.emit(Intent::Start), 1);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(prod.lifecycle().await, Lifecycle::Running);
        assert_eq!(dev.lifecycle().await, Lifecycle::Stopped);
        assert_eq!(hub.latest().env.as_deref(), Some("prod"));
    }

    #[tokio::test(start_paused = true)]
    async fn unbind_waits_for_intent_in_progress() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.delay_start(Duration::from_secs(5));
        let hub = ObserverHub::new();
        let bus = IntentBus::new();
        let c = controller(&backend, &hub, "dev").await;
        let bridge = CommandBridge::bind(&bus, c.clone(), None);

        bus.emit(Intent::Start);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(c.lifecycle().await, Lifecycle::Starting);

        bridge.unbind().await;
        assert_eq!(c.lifecycle().await, Lifecycle::Running);
        // queued after unbind: nobody listens
        assert_eq!(bus.emit(Intent::Stop), 0);
        assert_eq!(backend.stop_calls(), 0);
    }
}
