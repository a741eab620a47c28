// crates/backend/src/process.rs
//! Process table queries. The sysinfo calls are synchronous and run on the
//! blocking pool.

use std::time::Duration;

use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tokio::time::Instant;

fn refreshed(pid: u32) -> System {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    sys
}

fn alive_blocking(pid: u32) -> bool {
    let sys = refreshed(pid);
    sys.process(Pid::from_u32(pid))
        .is_some_and(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
}

/// True when `pid` names a live (non-zombie) process.
pub async fn is_alive(pid: u32) -> bool {
    tokio::task::spawn_blocking(move || alive_blocking(pid))
        .await
        .unwrap_or(false)
}

/// What became of a process after [`kill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// No live process had that pid.
    Gone,
    /// The process was signalled and is no longer alive.
    Killed,
    /// The signal was refused or the process outlived the grace period.
    Survived,
}

const KILL_GRACE: Duration = Duration::from_secs(2);
const KILL_POLL: Duration = Duration::from_millis(50);

/// `None` when there is no live process to signal, else whether the signal
/// was delivered.
fn signal_blocking(pid: u32) -> Option<bool> {
    let sys = refreshed(pid);
    let process = sys
        .process(Pid::from_u32(pid))
        .filter(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))?;
    Some(process.kill())
}

/// Kill `pid` and confirm it is gone.
pub async fn kill(pid: u32) -> KillOutcome {
    let delivered = tokio::task::spawn_blocking(move || signal_blocking(pid))
        .await
        .unwrap_or(Some(false));
    let Some(delivered) = delivered else {
        return KillOutcome::Gone;
    };
    let deadline = Instant::now() + KILL_GRACE;
    loop {
        if !is_alive(pid).await {
            return KillOutcome::Killed;
        }
        if !delivered || Instant::now() >= deadline {
            return KillOutcome::Survived;
        }
        tokio::time::sleep(KILL_POLL).await;
    }
}
