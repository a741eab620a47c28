// crates/core/src/scheduler.rs
//! The reconciliation loop behind a session's poll handle.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::controller::Inner;

/// Ownership token for the single live poll loop of a session.
pub(crate) struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Spawn a loop that sleeps `interval`, runs one cycle, and repeats. The
    /// next sleep starts only after the cycle completes, so slow backend
    /// calls never overlap.
    ///
    /// `parent` is the session's close token: closing the session cancels
    /// the loop even if nobody cancels the handle itself.
    pub(crate) fn spawn(
        session: Weak<Inner>,
        parent: &CancellationToken,
        interval: Duration,
    ) -> Self {
        let token = parent.child_token();
        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let Some(session) = session.upgrade() else {
                    break;
                };
                session.reconcile(&cancelled).await;
            }
            debug!("poll loop exited");
        });
        Self { token, task }
    }

    /// Cancel the loop. A cycle already past its last await finds the token
    /// cancelled before publishing and discards its result.
    pub(crate) fn cancel(self) -> JoinHandle<()> {
        self.token.cancel();
        self.task
    }
}
