// crates/types/src/lib.rs
//! Shared, serializable types for the Tilt Orchestrator workspace.
//!
//! Everything here crosses a boundary: the HTTP API, the SSE stream, the
//! tray menu, or the generated TypeScript bindings used by the desktop
//! frontend. Behavior lives in `tilt-orchestrator-core`.

pub mod intent;
pub mod notice;
pub mod project;
pub mod session;

pub use intent::{Intent, IntentKind, UnknownIntent};
pub use notice::{Notice, NoticeLevel};
pub use project::{
    Docker, Environment, Helm, K8s, Kustomize, Project, ProjectInfo, Repo, Service, TiltMode,
    TiltSettings,
};
pub use session::{Lifecycle, ObserverSnapshot, ParseLifecycleError, TrayTiltState};
