// crates/backend/src/lib.rs
//! Process-backed [`BackendGateway`](tilt_orchestrator_core::BackendGateway)
//! that runs `tilt up` for a project environment.
//!
//! Per-environment runtime state lives under `<workspace>/.tooling/`:
//! `<env>_runtime.json` records the status and pid of the spawned process,
//! `<env>_tilt.log` collects its stdout and stderr. Because that state is on
//! disk, a session opened after an app restart still finds a running Tilt.

pub mod generator;
mod process;
pub mod runtime;
mod tilt;

pub use tilt::TiltBackend;
