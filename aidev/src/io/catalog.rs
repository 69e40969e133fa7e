//! Workflow catalog: bundled template merged with a project override.
//!
//! Merging happens on the raw YAML mappings before any validation, so a
//! project entry replaces the template entry of the same name wholesale, even
//! when the project entry turns out to be invalid. Validation is per workflow:
//! a bad step drops its workflow with a warning and leaves the others intact.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use crate::workflow::{DEFAULT_STEP_TIMEOUT_SECS, WorkflowDefinition, WorkflowStep};

/// Bundled workflow template, also used to seed project files.
pub const TEMPLATE_WORKFLOWS: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/workflows.yaml"));

/// Result of a catalog load. Never fails as a whole.
#[derive(Debug, Default)]
pub struct CatalogLoad {
    pub workflows: BTreeMap<String, WorkflowDefinition>,
    pub warnings: Vec<String>,
}

impl CatalogLoad {
    pub fn names(&self) -> Vec<&str> {
        self.workflows.keys().map(String::as_str).collect()
    }
}

pub struct WorkflowCatalog {
    template: String,
    project_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawWorkflow {
    #[serde(default)]
    description: String,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    draft_ticket: bool,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    timeout_sec: Option<u64>,
    #[serde(default)]
    retries: Option<u32>,
}

impl WorkflowCatalog {
    /// Catalog backed by the bundled template and `project_path`.
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self::with_template(TEMPLATE_WORKFLOWS, project_path)
    }

    pub fn with_template(template: impl Into<String>, project_path: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            project_path: project_path.into(),
        }
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Load, merge and validate all workflows.
    pub fn load_workflows(&self) -> CatalogLoad {
        let mut load = CatalogLoad::default();
        let mut merged: BTreeMap<String, Value> = BTreeMap::new();

        if let Some(entries) = parse_entries("bundled template", &self.template, &mut load.warnings)
        {
            merged.extend(entries);
        }

        if self.project_path.exists() {
            let label = self.project_path.display().to_string();
            match fs::read_to_string(&self.project_path) {
                Ok(contents) => {
                    if let Some(entries) = parse_entries(&label, &contents, &mut load.warnings) {
                        merged.extend(entries);
                    }
                }
                Err(err) => load.warnings.push(format!("{label}: {err}")),
            }
        }

        for (name, value) in merged {
            match build_workflow(&name, value) {
                Ok(workflow) => {
                    load.workflows.insert(name, workflow);
                }
                Err(err) => {
                    warn!(workflow = %name, err = %err, "dropping invalid workflow");
                    load.warnings.push(format!("{name}: {err}"));
                }
            }
        }

        debug!(
            workflows = load.workflows.len(),
            warnings = load.warnings.len(),
            "workflow catalog loaded"
        );
        load
    }

    /// Seed the project file from the template if it does not exist yet.
    pub fn ensure_workflows_file(&self) -> Result<bool> {
        seed_workflows_file(&self.project_path, &self.template)
    }
}

/// Write the bundled template to `path` unless a file is already there.
///
/// Returns whether a file was created.
pub fn ensure_workflows_file(path: &Path) -> Result<bool> {
    seed_workflows_file(path, TEMPLATE_WORKFLOWS)
}

fn seed_workflows_file(path: &Path, template: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, template).with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "seeded workflows file");
    Ok(true)
}

/// Top-level `workflows` mapping of one source, keyed by name.
fn parse_entries(
    label: &str,
    contents: &str,
    warnings: &mut Vec<String>,
) -> Option<Vec<(String, Value)>> {
    let doc: Value = match serde_yaml::from_str(contents) {
        Ok(doc) => doc,
        Err(err) => {
            warnings.push(format!("{label}: {err}"));
            return None;
        }
    };
    let workflows = match &doc {
        Value::Null => return Some(Vec::new()),
        Value::Mapping(map) => match map.get("workflows") {
            None | Some(Value::Null) => return Some(Vec::new()),
            Some(Value::Mapping(workflows)) => workflows,
            Some(_) => {
                warnings.push(format!("{label}: `workflows` must be a mapping"));
                return None;
            }
        },
        _ => {
            warnings.push(format!("{label}: expected a mapping at the top level"));
            return None;
        }
    };
    Some(named_entries(label, workflows, warnings))
}

fn named_entries(label: &str, workflows: &Mapping, warnings: &mut Vec<String>) -> Vec<(String, Value)> {
    let mut entries = Vec::with_capacity(workflows.len());
    for (key, value) in workflows {
        match key.as_str() {
            Some(name) => entries.push((name.to_string(), value.clone())),
            None => warnings.push(format!("{label}: workflow name must be a string")),
        }
    }
    entries
}

fn build_workflow(name: &str, value: Value) -> Result<WorkflowDefinition> {
    let raw: RawWorkflow = serde_yaml::from_value(value)?;
    let mut seen = HashSet::new();
    let mut steps = Vec::with_capacity(raw.steps.len());
    for step in raw.steps {
        let step_name = non_empty(step.name);
        let prompt = non_empty(step.prompt);
        let (Some(step_name), Some(prompt)) = (step_name, prompt) else {
            return Err(anyhow!("step missing name/prompt"));
        };
        if !seen.insert(step_name.clone()) {
            return Err(anyhow!("duplicate step name '{step_name}'"));
        }
        let timeout_sec = step.timeout_sec.unwrap_or(DEFAULT_STEP_TIMEOUT_SECS);
        if timeout_sec == 0 {
            return Err(anyhow!("step '{step_name}': timeout_sec must be > 0"));
        }
        steps.push(WorkflowStep {
            name: step_name,
            prompt,
            tool: non_empty(step.tool),
            timeout_sec,
            retries: step.retries.unwrap_or(0),
        });
    }
    Ok(WorkflowDefinition {
        name: name.to_string(),
        description: raw.description,
        steps,
        tool: non_empty(raw.tool),
        draft_ticket: raw.draft_ticket,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
