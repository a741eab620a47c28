// crates/core/src/tray.rs
//! Tray menu as data.
//!
//! The menu is rebuilt from the latest [`ObserverSnapshot`] whenever it
//! changes; the shell that owns the real tray only renders it and reports
//! clicked item ids back through [`MenuAction::from_id`].

use serde::Serialize;
use tilt_orchestrator_types::{Intent, ObserverSnapshot, Project};

const SERVICE_EDITOR_PREFIX: &str = "service_editor_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrayMenuItem {
    Item {
        id: String,
        label: String,
        enabled: bool,
    },
    Submenu {
        label: String,
        items: Vec<TrayMenuItem>,
    },
    Separator,
}

impl TrayMenuItem {
    fn item(id: impl Into<String>, label: impl Into<String>, enabled: bool) -> Self {
        TrayMenuItem::Item {
            id: id.into(),
            label: label.into(),
            enabled,
        }
    }

    /// Depth-first lookup of an item by id.
    pub fn find(&self, wanted: &str) -> Option<&TrayMenuItem> {
        match self {
            TrayMenuItem::Item { id, .. } if id == wanted => Some(self),
            TrayMenuItem::Submenu { items, .. } => items.iter().find_map(|i| i.find(wanted)),
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, TrayMenuItem::Item { enabled: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrayMenu {
    pub items: Vec<TrayMenuItem>,
}

impl TrayMenu {
    /// Project the current session state into a menu. The services listed
    /// are those of the snapshot's environment.
    pub fn build(project: Option<&Project>, snapshot: &ObserverSnapshot) -> Self {
        let mut items = vec![
            TrayMenuItem::item("show_ui", "Show UI", true),
            TrayMenuItem::Separator,
        ];

        match project {
            Some(project) => {
                items.push(TrayMenuItem::item(
                    "project_name",
                    format!("Project: {}", project.name()),
                    true,
                ));
                items.push(TrayMenuItem::Separator);

                let tilt = snapshot.tray_state();
                items.push(TrayMenuItem::Submenu {
                    label: "Tilt Controls".into(),
                    items: vec![
                        TrayMenuItem::item("tilt_start", "Start Tilt", !tilt.is_running),
                        TrayMenuItem::item("tilt_stop", "Stop Tilt", tilt.is_running),
                        TrayMenuItem::item("tilt_restart", "Restart Tilt", tilt.is_running),
                        TrayMenuItem::item("tilt_web_ui", "Open Web UI", tilt.is_running),
                    ],
                });

                let services = snapshot
                    .env
                    .as_deref()
                    .and_then(|env| project.environment(env))
                    .map(|env| env.services.as_slice())
                    .unwrap_or_default();
                if !services.is_empty() {
                    items.push(TrayMenuItem::Submenu {
                        label: "Services".into(),
                        items: services
                            .iter()
                            .map(|service| TrayMenuItem::Submenu {
                                label: service.name.clone(),
                                items: vec![TrayMenuItem::item(
                                    format!("{SERVICE_EDITOR_PREFIX}{}", service.name),
                                    "Open in Editor",
                                    true,
                                )],
                            })
                            .collect(),
                    });
                }
            }
            None => items.push(TrayMenuItem::item("no_project", "No Project Open", false)),
        }

        items.push(TrayMenuItem::Separator);
        items.push(TrayMenuItem::item("quit", "Quit", true));
        Self { items }
    }

    pub fn find(&self, id: &str) -> Option<&TrayMenuItem> {
        self.items.iter().find_map(|i| i.find(id))
    }
}

/// What a clicked menu item asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    ShowUi,
    Intent(Intent),
    OpenWebUi,
    Quit,
}

impl MenuAction {
    /// `None` for ids that carry no action (labels, unknown ids).
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "show_ui" => Some(MenuAction::ShowUi),
            "tilt_start" => Some(MenuAction::Intent(Intent::Start)),
            "tilt_stop" => Some(MenuAction::Intent(Intent::Stop)),
            "tilt_restart" => Some(MenuAction::Intent(Intent::Restart)),
            "tilt_web_ui" => Some(MenuAction::OpenWebUi),
            "quit" => Some(MenuAction::Quit),
            _ => id
                .strip_prefix(SERVICE_EDITOR_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| {
                    MenuAction::Intent(Intent::OpenInEditor {
                        service: name.to_string(),
                    })
                }),
        }
    }
}
