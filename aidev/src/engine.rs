//! Workflow engine: materializes a workflow into a run manifest and drives
//! headless execution of its steps.
//!
//! Collaborators (prompt library, assistant availability, environment, step
//! runner) are injected so the state machine runs without real processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::budget::preview;
use crate::core::issue::{detect_issue_context, detect_ticket_source};
use crate::core::resolver::{AssistantPreferences, AssistantResolver, Availability};
use crate::core::selection::select_steps;
use crate::core::types::{IssueContext, StepStatus};
use crate::io::config::EngineConfig;
use crate::io::env::{DEFAULT_ASSISTANT_VAR, EnvLookup};
use crate::io::manifest_store::{ManifestStore, now_epoch};
use crate::io::prompts::{PromptLibrary, render_step_prompt};
use crate::io::step_runner::StepRunner;
use crate::manifest::{MANIFEST_SCHEMA_VERSION, RunManifest, StepInput, StepOutput, StepRecord};
use crate::workflow::WorkflowDefinition;

const DRAFT_SUMMARY_CHARS: usize = 2000;
const MAX_NAME_SUFFIX: u32 = 999;

/// Inputs for one `run_workflow` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunRequest<'a> {
    pub ticket: Option<&'a str>,
    pub ticket_file: Option<&'a Path>,
    pub user_prompt: Option<&'a str>,
    pub tool_override: Option<&'a str>,
    pub project_default_assistant: Option<&'a str>,
    pub from_step: Option<&'a str>,
    pub step_only: bool,
}

/// Outcome of running one step through its retry budget.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAttempt {
    Succeeded { result: Value, attempts: u32 },
    Failed { error: String, attempts: u32 },
}

impl StepAttempt {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn status(&self) -> StepStatus {
        match self {
            Self::Succeeded { .. } => StepStatus::Ok,
            Self::Failed { .. } => StepStatus::Error,
        }
    }

    fn result_value(self) -> Value {
        match self {
            Self::Succeeded { result, .. } => result,
            Self::Failed { error, attempts } => json!({ "error": error, "attempt": attempts }),
        }
    }
}

/// What `execute_manifest` did to one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepExecution {
    pub name: String,
    pub status: StepStatus,
    /// Zero when the step was already `ok` and skipped.
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub manifest_path: PathBuf,
    pub steps: Vec<StepExecution>,
}

impl ExecutionReport {
    pub fn failed(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|step| step.status.is_unsuccessful())
            .map(|step| step.name.as_str())
            .collect()
    }
}

pub struct WorkflowEngine<'a> {
    runs_dir: PathBuf,
    config: EngineConfig,
    prompts: &'a dyn PromptLibrary,
    availability: &'a dyn Availability,
    env: &'a dyn EnvLookup,
    runner: &'a dyn StepRunner,
}

impl<'a> WorkflowEngine<'a> {
    pub fn new(
        runs_dir: impl Into<PathBuf>,
        config: EngineConfig,
        prompts: &'a dyn PromptLibrary,
        availability: &'a dyn Availability,
        env: &'a dyn EnvLookup,
        runner: &'a dyn StepRunner,
    ) -> Self {
        Self {
            runs_dir: runs_dir.into(),
            config,
            prompts,
            availability,
            env,
            runner,
        }
    }

    /// Build and persist a run manifest for `workflow`. Returns the manifest path.
    ///
    /// Fails before writing anything when `from_step` names no step of the workflow.
    #[instrument(skip_all, fields(workflow = %workflow.name))]
    pub fn run_workflow(
        &self,
        workflow: &WorkflowDefinition,
        request: &RunRequest<'_>,
    ) -> Result<PathBuf> {
        let selected = select_steps(workflow, request.from_step, request.step_only)?;

        let ticket_source = detect_ticket_source(request.ticket, request.ticket_file.is_some());
        let ticket_text = load_ticket_text(request)?;
        let user_text = request
            .user_prompt
            .filter(|text| !text.is_empty())
            .unwrap_or(ticket_text.as_str());
        let issue_context = issue_context_for(&ticket_text, request.user_prompt);
        debug!(%ticket_source, is_issue = issue_context.is_issue, "classified input");

        let resolver = AssistantResolver::new(self.availability);
        let env_default = self.env.var(DEFAULT_ASSISTANT_VAR);
        let project_default = request
            .project_default_assistant
            .or(self.config.default_assistant.as_deref());
        let budget = self.config.preview_chars;

        let steps = selected
            .iter()
            .map(|step| {
                let assistant = resolver.resolve(&AssistantPreferences {
                    cli_override: request.tool_override,
                    workflow_tool: step.tool.as_deref().or(workflow.tool.as_deref()),
                    env_default: env_default.as_deref(),
                    project_default,
                });
                StepRecord {
                    name: step.name.clone(),
                    prompt_id: step.prompt.clone(),
                    prompt_text: render_step_prompt(self.prompts, &step.prompt),
                    assistant,
                    tool_timeout_sec: step.timeout_sec,
                    retries: step.retries,
                    input: StepInput {
                        ticket_source,
                        ticket_text_preview: preview(&ticket_text, budget),
                        user_prompt: preview(user_text, budget),
                        issue_context: issue_context.clone(),
                        extra: Map::new(),
                    },
                    output: StepOutput::not_run(),
                    extra: Map::new(),
                }
            })
            .collect();

        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let manifest_path = self.unique_manifest_path(&workflow.name, &timestamp)?;
        let manifest = RunManifest {
            workflow: workflow.name.clone(),
            description: workflow.description.clone(),
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            ticket_source,
            ticket_arg: request.ticket.map(str::to_string),
            ticket_file: request.ticket_file.map(Path::to_path_buf),
            steps,
            created_at: now_epoch(),
            proposal_output: sibling(&manifest_path, ".proposal.md"),
            manifest_path: manifest_path.clone(),
            completed_at: None,
            extra: Map::new(),
        };
        ManifestStore::create(&manifest_path, manifest)?;
        info!(path = %manifest_path.display(), "run manifest written");

        if workflow.draft_ticket {
            let draft = sibling(&manifest_path, "-draft.md");
            write_draft_ticket(&draft, workflow, request.ticket_file, &ticket_text, &manifest_path)?;
        }

        Ok(manifest_path)
    }

    /// Run every step that is not `ok` yet, persisting after each step.
    ///
    /// Step failures are recorded, never raised; `completed_at` is set once
    /// every step has been attempted.
    #[instrument(skip_all, fields(path = %manifest_path.display()))]
    pub fn execute_manifest(&self, manifest_path: &Path) -> Result<ExecutionReport> {
        let mut store = ManifestStore::open(manifest_path)?;
        let names: Vec<String> = store.steps().iter().map(|step| step.name.clone()).collect();
        let mut report = ExecutionReport {
            manifest_path: manifest_path.to_path_buf(),
            steps: Vec::with_capacity(names.len()),
        };

        for name in names {
            store.reload()?;
            let Some(step) = store.get_step(&name).cloned() else {
                warn!(step = %name, "step disappeared from manifest, skipping");
                continue;
            };
            if step.status().is_terminal() {
                debug!(step = %name, "already ok, skipping");
                report.steps.push(StepExecution {
                    name,
                    status: StepStatus::Ok,
                    attempts: 0,
                });
                continue;
            }

            let started_at = now_epoch();
            store.update_step(&name, |record| {
                record.output.started_at = Some(started_at);
                Ok(())
            })?;

            let attempt = run_with_retries(self.runner, &step, self.config.retry_delay());
            let attempts = attempt.attempts();
            let status = store.update_step(&name, |record| {
                if record.status().is_terminal() {
                    warn!(step = %name, "step completed externally while running, keeping external result");
                    return Ok(record.status());
                }
                let now = now_epoch();
                let status = attempt.status();
                record.output.status = status;
                if status.is_terminal() {
                    record.output.completed_at = Some(now);
                }
                record.output.result = attempt.result_value();
                record.output.ended_at = Some(now);
                Ok(status)
            })?;
            let execution = StepExecution {
                name: name.clone(),
                status,
                attempts,
            };
            info!(step = %name, status = %execution.status, attempts = execution.attempts, "step finished");
            report.steps.push(execution);
        }

        store.set_completed_at(now_epoch())?;
        Ok(report)
    }

    fn unique_manifest_path(&self, workflow: &str, timestamp: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.runs_dir)
            .with_context(|| format!("create directory {}", self.runs_dir.display()))?;
        let base = format!("{workflow}-{timestamp}");
        for suffix in 1..=MAX_NAME_SUFFIX {
            let stem = if suffix == 1 {
                base.clone()
            } else {
                format!("{base}-{suffix}")
            };
            let candidate = self.runs_dir.join(format!("{stem}.json"));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(anyhow!("unable to allocate a unique manifest name for {base}"))
    }
}

/// Attempt `step` up to `retries + 1` times, pausing `delay` between attempts.
pub fn run_with_retries(runner: &dyn StepRunner, step: &StepRecord, delay: Duration) -> StepAttempt {
    let total = step.retries.saturating_add(1);
    let mut last_error = String::new();
    for attempt in 1..=total {
        match runner.run(step) {
            Ok(result) => {
                return StepAttempt::Succeeded {
                    result,
                    attempts: attempt,
                };
            }
            Err(err) => {
                last_error = format!("{err:#}");
                warn!(step = %step.name, attempt, err = %last_error, "step attempt failed");
                if attempt < total && !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }
    }
    StepAttempt::Failed {
        error: last_error,
        attempts: total,
    }
}

/// Issue references in the ticket win; the user prompt is only consulted when
/// the ticket holds none.
fn issue_context_for(ticket_text: &str, user_prompt: Option<&str>) -> IssueContext {
    let from_ticket = detect_issue_context(Some(ticket_text));
    if from_ticket.is_issue {
        return from_ticket;
    }
    detect_issue_context(user_prompt)
}

fn load_ticket_text(request: &RunRequest<'_>) -> Result<String> {
    match request.ticket_file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("read ticket file {}", path.display()))
        }
        None => Ok(request.ticket.unwrap_or_default().to_string()),
    }
}

/// `<dir>/<stem><suffix>` for a manifest at `<dir>/<stem>.json`.
fn sibling(manifest_path: &Path, suffix: &str) -> PathBuf {
    let stem = manifest_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    manifest_path.with_file_name(format!("{stem}{suffix}"))
}

fn write_draft_ticket(
    path: &Path,
    workflow: &WorkflowDefinition,
    ticket_file: Option<&Path>,
    ticket_text: &str,
    manifest_path: &Path,
) -> Result<()> {
    let file_hint = ticket_file.map_or_else(|| "N/A".to_string(), |p| p.display().to_string());
    let summary = if ticket_text.trim().is_empty() {
        "Describe the opportunity here.".to_string()
    } else {
        preview(ticket_text, DRAFT_SUMMARY_CHARS)
    };
    let body = [
        format!("# Draft ticket: {}", workflow.name),
        format!("- File: {file_hint}"),
        "- Status: draft (local only)".to_string(),
        format!("- Manifest: {}", manifest_path.display()),
        String::new(),
        "## Summary".to_string(),
        summary,
        String::new(),
        "## Next Steps".to_string(),
        "- Convert to issue/ticket when ready".to_string(),
        "- Validate tests/impact before posting".to_string(),
    ]
    .join("\n");
    fs::write(path, body + "\n").with_context(|| format!("write draft ticket {}", path.display()))?;
    info!(path = %path.display(), "draft ticket written");
    Ok(())
}
