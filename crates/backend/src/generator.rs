// crates/backend/src/generator.rs
//! Tiltfile generation for one environment.
//!
//! Output layout, relative to the workspace:
//!
//! ```text
//! tilt/<env>/Tiltfile                    loads and invokes every service
//! tilt/<env>/services/<name>.tilt.py     one function per enabled service
//! ```
//!
//! Service paths inside the generated files are relative to `tilt/<env>/`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tilt_orchestrator_core::{BackendError, BackendOp};
use tilt_orchestrator_types::{Project, Service};

const HEADER: &str = "# GENERATED - DO NOT EDIT";

/// A file to write, path relative to the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Enabled services ordered so every service follows its dependencies.
/// Dependencies on services that are not enabled are ignored for ordering.
pub fn dependency_order<'a>(services: &[&'a Service]) -> Result<Vec<&'a Service>, BackendError> {
    let by_name: HashMap<&'a str, &'a Service> = services
        .iter()
        .copied()
        .map(|s| (s.name.as_str(), s))
        .collect();
    let mut done: HashSet<&'a str> = HashSet::new();
    let mut path: Vec<&'a str> = Vec::new();
    let mut ordered = Vec::with_capacity(services.len());

    fn visit<'a>(
        name: &'a str,
        by_name: &HashMap<&'a str, &'a Service>,
        done: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        ordered: &mut Vec<&'a Service>,
    ) -> Result<(), BackendError> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(at) = path.iter().position(|p| *p == name) {
            let mut cycle: Vec<String> = path[at..].iter().map(|s| s.to_string()).collect();
            cycle.push(name.to_string());
            return Err(BackendError::DependencyCycle { cycle });
        }
        let Some(&service) = by_name.get(name) else {
            return Ok(());
        };
        path.push(name);
        for dep in service.dependencies() {
            visit(dep, by_name, done, path, ordered)?;
        }
        path.pop();
        done.insert(name);
        ordered.push(service);
        Ok(())
    }

    for service in services.iter().copied() {
        visit(service.name.as_str(), &by_name, &mut done, &mut path, &mut ordered)?;
    }
    Ok(ordered)
}

fn ident(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// A Starlark string literal. JSON string escaping is valid Starlark.
fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

fn service_file(service: &Service, services_path: &str) -> String {
    let repo = format!("../../{services_path}/{}", service.repo_dir());
    let mut body = String::new();

    if let Some(docker) = &service.docker {
        body.push_str(&format!(
            "    docker_build(\n        {},\n        context={},\n        dockerfile={},\n    )\n",
            quoted(&service.name),
            quoted(&format!("{repo}/{}", docker.context)),
            quoted(&format!("{repo}/{}", docker.dockerfile)),
        ));
    }

    if let Some(helm) = &service.helm {
        body.push_str(&format!(
            "    k8s_yaml(helm(\n        {},\n        name={},\n        namespace={},\n",
            quoted(&helm.chart),
            quoted(&service.name),
            quoted(helm.namespace.as_deref().unwrap_or("default")),
        ));
        if let Some(values) = helm.values.as_ref().filter(|v| !v.is_empty()) {
            let sorted: BTreeMap<&String, &serde_json::Value> = values.iter().collect();
            let set: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    quoted(&format!("{k}={v}"))
                })
                .collect();
            body.push_str(&format!("        set=[{}],\n", set.join(", ")));
        }
        body.push_str("    ))\n");
    } else if let Some(kustomize) = &service.kustomize {
        body.push_str(&format!(
            "    k8s_yaml(kustomize({}))\n",
            quoted(&format!("{repo}/{}", kustomize.path))
        ));
    } else if let Some(k8s) = &service.k8s {
        body.push_str(&format!(
            "    k8s_yaml({})\n",
            quoted(&format!("{repo}/{}", k8s.manifests))
        ));
    }

    let deps: Vec<String> = service.dependencies().iter().map(|d| quoted(d)).collect();
    format!(
        "{HEADER}\n\ndef {}():\n{body}    k8s_resource(\n        {},\n        port_forwards={},\n        resource_deps=[{}],\n    )\n",
        ident(&service.name),
        quoted(&service.name),
        service.port,
        deps.join(", "),
    )
}

fn root_file(env: &str, services: &[&Service]) -> String {
    let loads: Vec<String> = services
        .iter()
        .map(|s| {
            format!(
                "load({}, {})",
                quoted(&format!("./services/{}.tilt.py", s.name)),
                quoted(&ident(&s.name))
            )
        })
        .collect();
    let calls: Vec<String> = services
        .iter()
        .map(|s| format!("    {},", ident(&s.name)))
        .collect();
    format!(
        "{HEADER}\n# Environment: {env}\n\n{}\n\nservices = [\n{}\n]\n\nfor svc in services:\n    svc()\n",
        loads.join("\n"),
        calls.join("\n"),
    )
}

/// Render every file for `env` without touching the filesystem.
pub fn render(project: &Project, env: &str) -> Result<Vec<GeneratedFile>, BackendError> {
    let environment = project
        .environment(env)
        .ok_or_else(|| BackendError::EnvironmentNotFound {
            env: env.to_string(),
        })?;
    let enabled: Vec<&Service> = environment.enabled_services().collect();
    let ordered = dependency_order(&enabled)?;

    let base = Path::new("tilt").join(env);
    let mut files = vec![GeneratedFile {
        path: base.join("Tiltfile"),
        contents: root_file(env, &ordered),
    }];
    files.extend(ordered.iter().map(|service| GeneratedFile {
        path: base.join("services").join(format!("{}.tilt.py", service.name)),
        contents: service_file(service, project.services_path()),
    }));
    Ok(files)
}

/// Render and write the files for `env` under the project workspace.
pub async fn generate(project: &Project, env: &str) -> Result<Vec<PathBuf>, BackendError> {
    let files = render(project, env)?;
    let workspace = Path::new(project.workspace_path());
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = workspace.join(&file.path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::io(BackendOp::GenerateArtifacts, parent, e))?;
        }
        tokio::fs::write(&path, file.contents)
            .await
            .map_err(|e| BackendError::io(BackendOp::GenerateArtifacts, &path, e))?;
        written.push(path);
    }
    Ok(written)
}
