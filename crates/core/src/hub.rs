// crates/core/src/hub.rs
//! Fan-out of controller state to observers (tray indicator, UI panels).
//!
//! Snapshots use latest-value semantics: an observer that falls behind skips
//! intermediate values but always ends on the newest one, and never sees an
//! older snapshot after a newer one. Notices are a separate lossy broadcast.

use std::sync::Arc;

use tilt_orchestrator_types::{Notice, ObserverSnapshot};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const NOTICE_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct ObserverHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    snapshots: watch::Sender<ObserverSnapshot>,
    notices: broadcast::Sender<Notice>,
}

impl Default for ObserverHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverHub {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(ObserverSnapshot::cleared());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            inner: Arc::new(HubInner { snapshots, notices }),
        }
    }

    /// Replace the current snapshot. Returns false when it equals the one
    /// already published, in which case observers are not woken.
    pub fn publish(&self, snapshot: ObserverSnapshot) -> bool {
        self.inner.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            debug!(
                project = ?snapshot.project,
                env = ?snapshot.env,
                lifecycle = %snapshot.lifecycle,
                "publishing snapshot"
            );
            *current = snapshot;
            true
        })
    }

    /// Publish the "no session" snapshot.
    pub fn clear(&self) -> bool {
        self.publish(ObserverSnapshot::cleared())
    }

    pub fn latest(&self) -> ObserverSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// A raw receiver, for consumers that drive their own loop (SSE).
    pub fn receiver(&self) -> watch::Receiver<ObserverSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Run `callback` with the current snapshot, then again after every
    /// change, until the returned [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(ObserverSnapshot) + Send + 'static,
    {
        let mut rx = self.receiver();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                callback(snapshot);
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Subscription {
            token,
            task: Some(task),
        }
    }

    pub fn notify(&self, notice: Notice) {
        // no receivers is fine: nobody is listening for toasts
        let _ = self.inner.notices.send(notice);
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }
}

/// Handle returned by [`ObserverHub::subscribe`].
pub struct Subscription {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop delivery and wait for the observer task to finish, so no callback
    /// runs after this returns.
    pub async fn unsubscribe(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
