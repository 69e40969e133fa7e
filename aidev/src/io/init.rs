//! Project-local `.aidev/` layout and scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use super::catalog::ensure_workflows_file;
use super::config::{EngineConfig, write_config};

/// All canonical project-local paths for a project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub aidev_dir: PathBuf,
    pub workflows_path: PathBuf,
    pub runs_dir: PathBuf,
    pub config_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let aidev_dir = root.join(".aidev");
        Self {
            root: root.clone(),
            workflows_path: aidev_dir.join("workflows.yaml"),
            runs_dir: aidev_dir.join("workflow-runs"),
            config_path: aidev_dir.join("config.toml"),
            aidev_dir,
        }
    }

    /// Resolve a manifest argument: an existing path, else a file name inside
    /// the runs directory (with or without the `.json` extension).
    ///
    /// Names that match no file resolve to the `.json` form so the caller
    /// reports a missing manifest rather than a missing `run.v2`.
    pub fn resolve_manifest(&self, arg: &str) -> PathBuf {
        let direct = PathBuf::from(arg);
        if direct.is_file() {
            return direct;
        }
        let in_runs = self.runs_dir.join(arg);
        if in_runs.is_file() {
            return in_runs;
        }
        let with_json = self.runs_dir.join(format!("{arg}.json"));
        if with_json.is_file() || !arg.ends_with(".json") {
            return with_json;
        }
        in_runs
    }
}

/// Create `.aidev/` with a seeded `workflows.yaml`, the runs directory and a
/// default `config.toml`. Existing files are left untouched.
pub fn init_project(root: &Path) -> Result<ProjectPaths> {
    let paths = ProjectPaths::new(root);
    if paths.aidev_dir.exists() && !paths.aidev_dir.is_dir() {
        return Err(anyhow!("aidev init: .aidev exists but is not a directory"));
    }
    fs::create_dir_all(&paths.runs_dir)
        .with_context(|| format!("create directory {}", paths.runs_dir.display()))?;
    ensure_workflows_file(&paths.workflows_path)?;
    if !paths.config_path.exists() {
        write_config(&paths.config_path, &EngineConfig::default())?;
    }
    info!(root = %paths.root.display(), "project initialized");
    Ok(paths)
}
