//! Locating an unconfigured `tilt` through `PATH`.
//!
//! Kept in its own test binary: it rewrites `PATH` for the whole process.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;

use tilt_orchestrator_backend::{runtime, TiltBackend};
use tilt_orchestrator_core::{testing, BackendError, BackendGateway};

#[tokio::test(flavor = "multi_thread")]
async fn tilt_is_found_on_path_and_missing_without_it() {
    let bin = tempfile::tempdir().unwrap();
    let ws = tempfile::tempdir().unwrap();
    let mut project = testing::project_with_services(&["api"]);
    project.project.workspace_path = ws.path().to_string_lossy().into_owned();

    let empty = tempfile::tempdir().unwrap();
    std::env::set_var("PATH", empty.path());
    let err = TiltBackend::default().start(&project, "dev").await.unwrap_err();
    assert!(matches!(err, BackendError::ToolNotFound));
    assert!(!runtime::runtime_path(ws.path(), "dev").exists());

    // not executable: skipped by the lookup
    let tilt = bin.path().join("tilt");
    std::fs::write(&tilt, "#!/bin/sh\nexec /bin/sleep 30\n").unwrap();
    std::fs::set_permissions(&tilt, std::fs::Permissions::from_mode(0o644)).unwrap();
    std::env::set_var("PATH", bin.path());
    let err = TiltBackend::default().start(&project, "dev").await.unwrap_err();
    assert!(matches!(err, BackendError::ToolNotFound));

    std::fs::set_permissions(&tilt, std::fs::Permissions::from_mode(0o755)).unwrap();
    let backend = TiltBackend::default();
    backend.start(&project, "dev").await.unwrap();
    let state = runtime::read_state(ws.path(), "dev").await;
    assert_eq!(state.tilt.status, "starting");
    backend.stop(&project, "dev").await.unwrap();
}
