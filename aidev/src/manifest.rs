//! Run manifest records.
//!
//! The manifest is a shared file: handed-off assistants rewrite it with their
//! own tooling, so field names are fixed and unknown fields are carried in
//! `extra` maps and written back untouched.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::core::types::{IssueContext, StepStatus, TicketSource};

pub const MANIFEST_SCHEMA_VERSION: &str = "1.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub workflow: String,
    #[serde(default)]
    pub description: String,
    pub schema_version: String,
    pub ticket_source: TicketSource,
    #[serde(default)]
    pub ticket_arg: Option<String>,
    #[serde(default)]
    pub ticket_file: Option<PathBuf>,
    pub steps: Vec<StepRecord>,
    #[serde(deserialize_with = "epoch_secs")]
    pub created_at: i64,
    pub manifest_path: PathBuf,
    pub proposal_output: PathBuf,
    #[serde(
        default,
        deserialize_with = "optional_epoch_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub prompt_id: String,
    pub prompt_text: String,
    pub assistant: String,
    pub tool_timeout_sec: u64,
    #[serde(default)]
    pub retries: u32,
    pub input: StepInput,
    pub output: StepOutput,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Snapshot of what the step was asked to work on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInput {
    pub ticket_source: TicketSource,
    #[serde(default)]
    pub ticket_text_preview: String,
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub issue_context: IssueContext,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutput {
    pub status: StepStatus,
    #[serde(default)]
    pub result: Value,
    #[serde(
        default,
        deserialize_with = "optional_epoch_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<i64>,
    #[serde(
        default,
        deserialize_with = "optional_epoch_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub ended_at: Option<i64>,
    #[serde(
        default,
        deserialize_with = "optional_epoch_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StepOutput {
    pub fn not_run() -> Self {
        Self {
            status: StepStatus::NotRun,
            result: Value::Null,
            started_at: None,
            ended_at: None,
            completed_at: None,
            extra: Map::new(),
        }
    }
}

impl StepRecord {
    pub fn status(&self) -> StepStatus {
        self.output.status
    }

    /// Text handed to the assistant as user content.
    pub fn input_text(&self) -> &str {
        if self.input.user_prompt.is_empty() {
            &self.input.ticket_text_preview
        } else {
            &self.input.user_prompt
        }
    }
}

impl RunManifest {
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|step| step.name == name)
    }

    pub fn step_mut(&mut self, name: &str) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|step| step.name == name)
    }

    fn names_where(&self, pred: impl Fn(StepStatus) -> bool) -> Vec<String> {
        self.steps
            .iter()
            .filter(|step| pred(step.status()))
            .map(|step| step.name.clone())
            .collect()
    }

    /// Steps still `not-run`.
    pub fn pending_steps(&self) -> Vec<String> {
        self.names_where(|status| status == StepStatus::NotRun)
    }

    pub fn completed_steps(&self) -> Vec<String> {
        self.names_where(StepStatus::is_terminal)
    }

    /// Steps that ended `failed` or `error`.
    pub fn failed_steps(&self) -> Vec<String> {
        self.names_where(StepStatus::is_unsuccessful)
    }

    pub fn all_ok(&self) -> bool {
        self.steps.iter().all(|step| step.status().is_terminal())
    }

    /// First step that still needs work, in list order.
    pub fn next_unfinished(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|step| !step.status().is_terminal())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EpochRepr {
    Int(i64),
    Float(f64),
}

impl EpochRepr {
    fn secs(self) -> i64 {
        match self {
            Self::Int(secs) => secs,
            Self::Float(secs) => secs.trunc() as i64,
        }
    }
}

// External writers sometimes record fractional seconds.
fn epoch_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    EpochRepr::deserialize(deserializer).map(EpochRepr::secs)
}

fn optional_epoch_secs<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    Ok(Option::<EpochRepr>::deserialize(deserializer)?.map(EpochRepr::secs))
}
