//! End-to-end lifecycle against a stand-in `tilt` script.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tilt_orchestrator_backend::{runtime, TiltBackend};
use tilt_orchestrator_core::{testing, BackendGateway};
use tilt_orchestrator_types::Project;

const FAKE_TILT: &str = r#"#!/bin/sh
case "$1" in
  version) echo "v0.33.10, built 2024-01-01" ;;
  up)
    echo "Tilt started on http://localhost:10350/"
    echo "tiltfile: $3" >&2
    exec sleep 30
    ;;
  *) exit 2 ;;
esac
"#;

fn fake_tilt(dir: &Path) -> PathBuf {
    let path = dir.join("tilt");
    std::fs::write(&path, FAKE_TILT).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn project_in(dir: &Path) -> Project {
    let mut project = testing::project_with_services(&["api"]);
    project.project.workspace_path = dir.to_string_lossy().into_owned();
    project
}

async fn wait_for_logs(backend: &TiltBackend, project: &Project, lines: usize) -> Vec<String> {
    for _ in 0..100 {
        let window = backend.fetch_logs(project, "dev", None).await.unwrap();
        if window.logs.len() >= lines {
            return window.logs;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("tilt output never reached the log file");
}

#[tokio::test(flavor = "multi_thread")]
async fn start_status_logs_stop() {
    let bin = tempfile::tempdir().unwrap();
    let ws = tempfile::tempdir().unwrap();
    let project = project_in(ws.path());
    let backend = TiltBackend::new(Some(fake_tilt(bin.path())));

    backend.generate_artifacts(&project, "dev").await.unwrap();
    assert!(ws.path().join("tilt/dev/Tiltfile").is_file());

    backend.start(&project, "dev").await.unwrap();
    let state = runtime::read_state(ws.path(), "dev").await;
    assert_eq!(state.tilt.status, "starting");
    let pid = state.tilt.pid.unwrap();

    let logs = wait_for_logs(&backend, &project, 2).await;
    assert_eq!(logs[0], "Tilt started on http://localhost:10350/");
    assert!(logs.iter().any(|l| l.ends_with("tilt/dev/Tiltfile")));

    assert_eq!(backend.query_status(&project, "dev").await.unwrap().status, "running");

    // starting again while alive keeps the same process
    backend.start(&project, "dev").await.unwrap();
    assert_eq!(runtime::read_state(ws.path(), "dev").await.tilt.pid, Some(pid));

    backend.stop(&project, "dev").await.unwrap();
    assert_eq!(runtime::read_state(ws.path(), "dev").await, runtime::RuntimeState::stopped());
    assert_eq!(backend.query_status(&project, "dev").await.unwrap().status, "stopped");
}

#[tokio::test(flavor = "multi_thread")]
async fn start_truncates_previous_log() {
    let bin = tempfile::tempdir().unwrap();
    let ws = tempfile::tempdir().unwrap();
    let project = project_in(ws.path());
    std::fs::create_dir_all(ws.path().join(runtime::TOOLING_DIR)).unwrap();
    std::fs::write(runtime::log_path(ws.path(), "dev"), "old run\n".repeat(50)).unwrap();

    let backend = TiltBackend::new(Some(fake_tilt(bin.path())));
    backend.start(&project, "dev").await.unwrap();
    let logs = wait_for_logs(&backend, &project, 1).await;
    assert!(logs.iter().all(|l| l != "old run"));

    backend.stop(&project, "dev").await.unwrap();
}
