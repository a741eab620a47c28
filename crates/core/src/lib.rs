// crates/core/src/lib.rs
//! Session control for a single Tilt instance.
//!
//! A [`SessionController`] owns the lifecycle of one (project, environment)
//! pair: it runs start/stop/restart against a [`BackendGateway`], keeps a
//! self-rescheduling reconciliation loop alive while the tool is not stopped,
//! derives the web UI URL from fetched logs and publishes snapshots through
//! the [`ObserverHub`]. The [`CommandBridge`] feeds externally raised intents
//! into the current controller and [`SessionHost`] ties the pieces together
//! across environment switches.

pub mod analyzer;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod host;
pub mod hub;
mod scheduler;
pub mod tray;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use analyzer::{analyze, Analysis};
pub use bridge::{CommandBridge, IntentBus, Unlisten};
pub use config::{AppConfig, ConfigError, ControllerConfig};
pub use controller::SessionController;
pub use error::{BackendError, BackendOp, CommandError};
pub use gateway::{BackendGateway, LogWindow, StatusReport};
pub use host::SessionHost;
pub use hub::{ObserverHub, Subscription};
pub use tray::{MenuAction, TrayMenu, TrayMenuItem};

pub use tilt_orchestrator_types as types;
