// crates/types/src/project.rs
//! Project and service configuration as stored in a workspace.
//!
//! The controller only reads this model: it checks which services are
//! enabled before starting Tilt and resolves repository directories for the
//! editor. Persistence and editing live outside this workspace.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Default directory (relative to the workspace) holding service repositories.
pub const DEFAULT_SERVICES_PATH: &str = "repos";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct Project {
    pub project: ProjectInfo,
    #[serde(default)]
    pub environments: HashMap<String, Environment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct ProjectInfo {
    pub name: String,
    pub workspace_path: String,
    pub tilt: TiltSettings,
    #[serde(default)]
    pub services_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct TiltSettings {
    pub mode: TiltMode,
}

/// How Tiltfiles are laid out for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(rename_all = "kebab-case")]
pub enum TiltMode {
    #[serde(alias = "Root")]
    Root,
    #[serde(alias = "PerRepo")]
    PerRepo,
    #[serde(alias = "Hybrid")]
    Hybrid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct Environment {
    #[serde(default)]
    pub shared_env: HashMap<String, String>,
    #[serde(default)]
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct Service {
    pub name: String,
    /// Repository directory name; falls back to `name` when absent.
    #[serde(default)]
    pub path: Option<String>,
    pub port: u16,
    pub enabled: bool,
    #[serde(default)]
    pub repo: Option<Repo>,
    #[serde(default)]
    pub docker: Option<Docker>,
    #[serde(default)]
    pub k8s: Option<K8s>,
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,
    #[serde(default)]
    pub depends_on: Option<Vec<String>>,
    #[serde(default)]
    pub helm: Option<Helm>,
    #[serde(default)]
    pub kustomize: Option<Kustomize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct Repo {
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct Docker {
    pub context: String,
    pub dockerfile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct K8s {
    pub manifests: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct Helm {
    pub chart: String,
    #[serde(default)]
    pub values: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub struct Kustomize {
    pub path: String,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.project.name
    }

    pub fn workspace_path(&self) -> &str {
        &self.project.workspace_path
    }

    pub fn services_path(&self) -> &str {
        self.project
            .services_path
            .as_deref()
            .unwrap_or(DEFAULT_SERVICES_PATH)
    }

    pub fn environment(&self, env: &str) -> Option<&Environment> {
        self.environments.get(env)
    }

    /// Environment names in a stable (sorted) order.
    pub fn environment_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.environments.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The environment a freshly opened project screen selects.
    ///
    /// `dev` wins when present, otherwise the first name in sorted order.
    pub fn default_environment(&self) -> Option<&str> {
        if self.environments.contains_key("dev") {
            return Some("dev");
        }
        self.environment_names().into_iter().next()
    }
}

impl Environment {
    pub fn enabled_services(&self) -> impl Iterator<Item = &Service> {
        self.services.iter().filter(|s| s.enabled)
    }

    pub fn has_enabled_services(&self) -> bool {
        self.services.iter().any(|s| s.enabled)
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }
}

impl Service {
    /// Directory name of the service repository under the services path.
    pub fn repo_dir(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }

    pub fn dependencies(&self) -> &[String] {
        self.depends_on.as_deref().unwrap_or(&[])
    }
}
