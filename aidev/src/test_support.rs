//! Test-only helpers: manifest fixtures and scripted collaborators.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};

use crate::core::types::{IssueContext, StepStatus, TicketSource};
use crate::handoff::Launcher;
use crate::io::env::DEFAULT_ASSISTANT_VAR;
use crate::io::init::{ProjectPaths, init_project};
use crate::io::manifest_store::write_manifest;
use crate::io::step_runner::StepRunner;
use crate::io::tools::{ToolInfo, ToolProbe, tool_spec};
use crate::manifest::{MANIFEST_SCHEMA_VERSION, RunManifest, StepInput, StepOutput, StepRecord};

/// Deterministic step record with the given status.
pub fn step_record(name: &str, assistant: &str, status: StepStatus) -> StepRecord {
    let mut output = StepOutput::not_run();
    output.status = status;
    if status != StepStatus::NotRun {
        output.result = Value::String(format!("{name} {status}"));
    }
    StepRecord {
        name: name.to_string(),
        prompt_id: format!("{name}_prompt"),
        prompt_text: format!("{name} prompt"),
        assistant: assistant.to_string(),
        tool_timeout_sec: 30,
        retries: 0,
        input: StepInput {
            ticket_source: TicketSource::Raw,
            ticket_text_preview: String::new(),
            user_prompt: format!("{name} input"),
            issue_context: IssueContext::none(),
            extra: Map::new(),
        },
        output,
        extra: Map::new(),
    }
}

/// Manifest for `path` holding one `claude` step per `(name, status)`.
pub fn manifest_with_steps(path: &Path, steps: &[(&str, StepStatus)]) -> RunManifest {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    RunManifest {
        workflow: "demo".to_string(),
        description: "demo workflow".to_string(),
        schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
        ticket_source: TicketSource::Raw,
        ticket_arg: None,
        ticket_file: None,
        steps: steps
            .iter()
            .map(|(name, status)| step_record(name, "claude", *status))
            .collect(),
        created_at: 1_700_000_000,
        manifest_path: path.to_path_buf(),
        proposal_output: path.with_file_name(format!("{stem}.proposal.md")),
        completed_at: None,
        extra: Map::new(),
    }
}

pub fn write_manifest_fixture(path: &Path, manifest: &RunManifest) -> Result<()> {
    write_manifest(path, manifest)
}

/// Step runner that replays queued results and records which steps it saw.
///
/// `Err(text)` entries become attempt failures. Once the queue is empty the
/// fallback result is returned forever.
pub struct ScriptedRunner {
    queue: RefCell<VecDeque<Result<Value, String>>>,
    fallback: Result<Value, String>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new(results: Vec<Result<Value, String>>) -> Self {
        Self {
            queue: RefCell::new(results.into()),
            fallback: Err("scripted runner exhausted".to_string()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn always_succeeding(result: Value) -> Self {
        Self {
            fallback: Ok(result),
            ..Self::new(Vec::new())
        }
    }

    pub fn always_failing(error: &str) -> Self {
        Self {
            fallback: Err(error.to_string()),
            ..Self::new(Vec::new())
        }
    }

    /// Step names in call order, one entry per attempt.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl StepRunner for ScriptedRunner {
    fn run(&self, step: &StepRecord) -> Result<Value> {
        self.calls.borrow_mut().push(step.name.clone());
        let next = self
            .queue
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        next.map_err(|err| anyhow!(err))
    }
}

/// Tool probe backed by a fixed set of installed binaries.
pub struct FakeProbe {
    installed: HashSet<String>,
}

impl FakeProbe {
    pub fn with_installed(binaries: &[&str]) -> Self {
        Self {
            installed: binaries.iter().map(|b| (*b).to_string()).collect(),
        }
    }
}

impl ToolProbe for FakeProbe {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        self.installed
            .contains(binary)
            .then(|| PathBuf::from("/fake/bin").join(binary))
    }

    fn detect(&self, id: &str) -> Result<ToolInfo> {
        let spec = tool_spec(id).ok_or_else(|| anyhow!("unsupported tool: {id}"))?;
        let mut info = ToolInfo::not_installed(spec);
        info.binary_path = self.locate(spec.binary);
        info.installed = info.binary_path.is_some();
        Ok(info)
    }
}

/// Launcher that records argv instead of starting processes.
pub struct RecordingLauncher {
    exit_code: Option<i32>,
    attached: RefCell<Vec<Vec<String>>>,
    detached: RefCell<Vec<Vec<String>>>,
}

impl RecordingLauncher {
    pub fn exiting(exit_code: Option<i32>) -> Self {
        Self {
            exit_code,
            attached: RefCell::new(Vec::new()),
            detached: RefCell::new(Vec::new()),
        }
    }

    pub fn attached_calls(&self) -> Vec<Vec<String>> {
        self.attached.borrow().clone()
    }

    pub fn detached_calls(&self) -> Vec<Vec<String>> {
        self.detached.borrow().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn run_attached(&self, argv: &[String]) -> Result<Option<i32>> {
        self.attached.borrow_mut().push(argv.to_vec());
        Ok(self.exit_code)
    }

    fn spawn_detached(&self, argv: &[String]) -> Result<()> {
        self.detached.borrow_mut().push(argv.to_vec());
        Ok(())
    }
}

/// Environment with only `AIDEV_DEFAULT_ASSISTANT` set (or nothing).
pub fn env_with_default(assistant: Option<&str>) -> HashMap<String, String> {
    assistant
        .map(|a| HashMap::from([(DEFAULT_ASSISTANT_VAR.to_string(), a.to_string())]))
        .unwrap_or_default()
}

/// Temporary project root with `.aidev/` scaffolding.
pub struct TestProject {
    temp: tempfile::TempDir,
    paths: ProjectPaths,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let paths = init_project(temp.path())?;
        Ok(Self { temp, paths })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Replace the project's `workflows.yaml`.
    pub fn write_workflows(&self, yaml: &str) -> Result<()> {
        fs::write(&self.paths.workflows_path, yaml)
            .with_context(|| format!("write {}", self.paths.workflows_path.display()))
    }

    /// Manifest files currently in the runs directory, sorted.
    pub fn manifests(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.paths.runs_dir).context("read runs dir")? {
            let path = entry.context("read runs entry")?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }
}
