//! Hand a run manifest over to an interactive assistant.
//!
//! CLI assistants are started in the foreground with an instruction to read
//! the manifest and update it step by step. GUI-only tools get a standalone
//! prompt file next to the manifest and are opened on it in the background.
//! Every outcome carries the manifest path so the run can be resumed by hand.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::command::{CommandMode, CommandPrompt, assistant_command};
use crate::core::resolver::AssistantResolver;
use crate::io::manifest_store::load_manifest;
use crate::io::prompts::{
    GuiStepLine, handoff_instruction, handoff_user_prompt, render_gui_prompt,
};
use crate::io::tools::{ProbeAvailability, ToolKind, ToolProbe, install_url, tool_spec};
use crate::manifest::RunManifest;

/// Starts assistant processes.
pub trait Launcher {
    /// Run attached to the current terminal and wait. Returns the exit code
    /// (`None` when killed by a signal).
    fn run_attached(&self, argv: &[String]) -> Result<Option<i32>>;

    /// Start in the background without waiting.
    fn spawn_detached(&self, argv: &[String]) -> Result<()>;
}

pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn run_attached(&self, argv: &[String]) -> Result<Option<i32>> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("empty command line"))?;
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("launch {program}"))?;
        Ok(status.code())
    }

    fn spawn_detached(&self, argv: &[String]) -> Result<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("empty command line"))?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd.spawn().with_context(|| format!("launch {program}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// The assistant ran and exited cleanly.
    Completed,
    /// The assistant exited non-zero (or by signal).
    Exited { code: Option<i32> },
    /// A GUI tool was opened on a generated prompt file.
    OpenedGui { prompt_file: PathBuf },
    NotInstalled { install_url: String },
    /// Installed, but there is no way to pass it the instruction.
    Unsupported,
    LaunchFailed { error: String },
}

#[derive(Debug, Clone)]
pub struct HandoffReport {
    pub assistant: String,
    pub manifest_path: PathBuf,
    pub outcome: HandoffOutcome,
}

impl HandoffReport {
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            HandoffOutcome::Completed | HandoffOutcome::OpenedGui { .. }
        )
    }

    /// Human-readable summary for the terminal.
    pub fn message(&self) -> String {
        let manifest = self.manifest_path.display();
        let assistant = &self.assistant;
        match &self.outcome {
            HandoffOutcome::Completed => {
                format!("Handed off to '{assistant}'. Manifest: {manifest}")
            }
            HandoffOutcome::Exited { code } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                format!("Assistant '{assistant}' exited with code {code}. Manifest: {manifest}")
            }
            HandoffOutcome::OpenedGui { prompt_file } => format!(
                "Opened '{assistant}' with workflow prompt {}. Manifest: {manifest}",
                prompt_file.display()
            ),
            HandoffOutcome::NotInstalled { install_url } => format!(
                "Assistant '{assistant}' is not installed. Install it from {install_url}. Manifest: {manifest}"
            ),
            HandoffOutcome::Unsupported => format!(
                "No handoff command available for assistant '{assistant}'. Open the manifest manually: {manifest}"
            ),
            HandoffOutcome::LaunchFailed { error } => {
                format!("Failed to launch assistant '{assistant}': {error}. Manifest: {manifest}")
            }
        }
    }
}

pub struct HandoffController<'a> {
    probe: &'a dyn ToolProbe,
    launcher: &'a dyn Launcher,
    ollama_model: String,
}

impl<'a> HandoffController<'a> {
    pub fn new(probe: &'a dyn ToolProbe, launcher: &'a dyn Launcher, ollama_model: &str) -> Self {
        Self {
            probe,
            launcher,
            ollama_model: ollama_model.to_string(),
        }
    }

    /// Assistant for a handoff: explicit override, else the first unfinished
    /// step's assistant, else the first installed tool.
    pub fn pick_assistant(&self, manifest: &RunManifest, override_id: Option<&str>) -> String {
        if let Some(id) = override_id.map(str::trim).filter(|id| !id.is_empty()) {
            return id.to_string();
        }
        if let Some(step) = manifest.next_unfinished() {
            return step.assistant.clone();
        }
        let availability = ProbeAvailability(self.probe);
        AssistantResolver::new(&availability).fallback_by_availability()
    }

    /// Launch `assistant` on the manifest. Launch problems are reported in the
    /// outcome; only prompt-file I/O is an error.
    #[instrument(skip(self), fields(path = %manifest_path.display()))]
    pub fn handoff(&self, manifest_path: &Path, assistant: &str) -> Result<HandoffReport> {
        let outcome = match tool_spec(assistant).map(|spec| spec.kind) {
            Some(ToolKind::Gui) => self.handoff_gui(manifest_path, assistant)?,
            _ => self.handoff_cli(manifest_path, assistant),
        };
        match &outcome {
            HandoffOutcome::Completed | HandoffOutcome::OpenedGui { .. } => {
                info!(assistant, "handoff finished");
            }
            other => warn!(assistant, outcome = ?other, "handoff did not complete"),
        }
        Ok(HandoffReport {
            assistant: assistant.to_string(),
            manifest_path: manifest_path.to_path_buf(),
            outcome,
        })
    }

    fn handoff_cli(&self, manifest_path: &Path, assistant: &str) -> HandoffOutcome {
        let user_prompt = handoff_user_prompt(manifest_path);
        let prompt = CommandPrompt {
            prompt_text: handoff_instruction(),
            input: &user_prompt,
        };
        let argv = assistant_command(
            assistant,
            &prompt,
            CommandMode::Interactive,
            &self.ollama_model,
            |binary| self.probe.locate(binary).is_some(),
        );
        let Some(argv) = argv else {
            if self.probe.is_installed(assistant) {
                return HandoffOutcome::Unsupported;
            }
            return HandoffOutcome::NotInstalled {
                install_url: install_url(assistant).to_string(),
            };
        };
        match self.launcher.run_attached(&argv) {
            Ok(Some(0)) => HandoffOutcome::Completed,
            Ok(code) => HandoffOutcome::Exited { code },
            Err(err) => HandoffOutcome::LaunchFailed {
                error: format!("{err:#}"),
            },
        }
    }

    fn handoff_gui(&self, manifest_path: &Path, assistant: &str) -> Result<HandoffOutcome> {
        let Some(binary) = tool_spec(assistant).map(|spec| spec.binary) else {
            return Ok(HandoffOutcome::Unsupported);
        };
        let Some(binary_path) = self.probe.locate(binary) else {
            return Ok(HandoffOutcome::NotInstalled {
                install_url: install_url(assistant).to_string(),
            });
        };

        let prompt_file = gui_prompt_path(manifest_path, assistant);
        let contents = gui_prompt_contents(manifest_path)?;
        fs::write(&prompt_file, contents)
            .with_context(|| format!("write prompt file {}", prompt_file.display()))?;

        let argv = vec![
            binary_path.to_string_lossy().into_owned(),
            prompt_file.to_string_lossy().into_owned(),
        ];
        Ok(match self.launcher.spawn_detached(&argv) {
            Ok(()) => HandoffOutcome::OpenedGui { prompt_file },
            Err(err) => HandoffOutcome::LaunchFailed {
                error: format!("{err:#}"),
            },
        })
    }
}

/// `<dir>/<stem>-<tool>-prompt.md` beside the manifest.
pub fn gui_prompt_path(manifest_path: &Path, tool: &str) -> PathBuf {
    let stem = manifest_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    manifest_path.with_file_name(format!("{stem}-{tool}-prompt.md"))
}

fn gui_prompt_contents(manifest_path: &Path) -> Result<String> {
    // An unreadable manifest still gets a usable prompt that points at it.
    let (workflow, description, steps) = match load_manifest(manifest_path) {
        Ok(manifest) => {
            let steps = manifest
                .steps
                .iter()
                .map(|step| GuiStepLine {
                    name: step.name.clone(),
                    status: step.status().to_string(),
                })
                .collect();
            (manifest.workflow, manifest.description, steps)
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "manifest unreadable, writing generic prompt");
            ("workflow".to_string(), String::new(), Vec::new())
        }
    };
    render_gui_prompt(manifest_path, &workflow, &description, &steps)
}
