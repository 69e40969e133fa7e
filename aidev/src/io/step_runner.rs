//! Step runner abstraction for headless manifest execution.
//!
//! The [`StepRunner`] trait decouples the retry loop from real assistant
//! processes. Tests use scripted runners that return predetermined results
//! without spawning anything.

use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::core::budget::{PROMPT_ECHO_CHARS, STDERR_QUOTE_CHARS, preview};
use crate::core::command::{CommandMode, CommandPrompt, assistant_command};
use crate::io::process::run_command_with_timeout;
use crate::io::tools::ToolProbe;
use crate::manifest::StepRecord;

/// Runs one step. An `Err` is an attempt failure, recorded and retried by the engine.
pub trait StepRunner {
    fn run(&self, step: &StepRecord) -> Result<Value>;
}

/// Runs a step by invoking the step's assistant CLI headlessly.
pub struct AssistantStepRunner<'a> {
    probe: &'a dyn ToolProbe,
    ollama_model: String,
    output_limit_bytes: usize,
}

impl<'a> AssistantStepRunner<'a> {
    pub fn new(probe: &'a dyn ToolProbe, ollama_model: &str, output_limit_bytes: usize) -> Self {
        Self {
            probe,
            ollama_model: ollama_model.to_string(),
            output_limit_bytes,
        }
    }
}

impl StepRunner for AssistantStepRunner<'_> {
    #[instrument(skip_all, fields(step = %step.name, assistant = %step.assistant))]
    fn run(&self, step: &StepRecord) -> Result<Value> {
        let prompt = CommandPrompt {
            prompt_text: &step.prompt_text,
            input: step.input_text(),
        };
        let argv = assistant_command(
            &step.assistant,
            &prompt,
            CommandMode::Headless,
            &self.ollama_model,
            |binary| self.probe.locate(binary).is_some(),
        )
        .ok_or_else(|| anyhow!("No runner available for assistant '{}'", step.assistant))?;

        info!(program = %argv[0], timeout_secs = step.tool_timeout_sec, "running step");
        let timeout = Duration::from_secs(step.tool_timeout_sec);
        let output = run_command_with_timeout(&argv, timeout, self.output_limit_bytes)?;

        if output.timed_out {
            warn!("step timed out");
            return Err(anyhow!("Timeout after {}s", step.tool_timeout_sec));
        }
        let stderr = output.stderr_text();
        if !output.status.success() {
            let rc = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            warn!(rc = %rc, "step command failed");
            return Err(anyhow!(
                "{} -> rc={}, stderr={}",
                argv[0],
                rc,
                preview(&stderr, STDERR_QUOTE_CHARS)
            ));
        }

        Ok(json!({
            "assistant": step.assistant,
            "returncode": output.status.code().unwrap_or_default(),
            "stdout": output.stdout_text(),
            "stderr": stderr,
            "prompt_used": preview(&step.prompt_text, PROMPT_ECHO_CHARS),
        }))
    }
}
