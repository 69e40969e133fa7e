//! Shared deterministic types for the workflow engine.
//!
//! Serialized names are part of the manifest contract read by external
//! assistants and status readers, so they must not change.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-step execution status recorded in `steps[i].output.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    #[serde(rename = "not-run")]
    NotRun,
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "failed")]
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRun => "not-run",
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Failed => "failed",
        }
    }

    /// `ok` is terminal: once a step succeeded its record is never rewritten.
    pub fn is_terminal(self) -> bool {
        self == Self::Ok
    }

    /// Both `error` (executor exhausted retries) and `failed` (reported by an
    /// assistant or a human) count as unsuccessful.
    pub fn is_unsuccessful(self) -> bool {
        matches!(self, Self::Error | Self::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse provenance of the ticket input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketSource {
    File,
    Jira,
    Github,
    Raw,
}

impl TicketSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Jira => "jira",
            Self::Github => "github",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for TicketSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket system an issue reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Jira,
    Github,
    Gitlab,
}

/// Which rule of the issue classifier matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePattern {
    AtlassianUrl,
    JiraKey,
    GithubUrl,
    GithubShorthand,
    GitlabUrl,
    GitlabSelfHostedUrl,
    GitlabShorthand,
}

/// Classification of a free-text blob as an issue reference.
///
/// Serializes with explicit `null`s so external readers always see all four keys.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IssueContext {
    pub is_issue: bool,
    pub issue_type: Option<IssueType>,
    pub issue_id: Option<String>,
    pub detected_pattern: Option<IssuePattern>,
}

impl IssueContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn matched(issue_type: IssueType, issue_id: Option<String>, pattern: IssuePattern) -> Self {
        Self {
            is_issue: true,
            issue_type: Some(issue_type),
            issue_id,
            detected_pattern: Some(pattern),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_status_uses_manifest_spelling() {
        let json = serde_json::to_string(&StepStatus::NotRun).expect("serialize");
        assert_eq!(json, "\"not-run\"");
        let parsed: StepStatus = serde_json::from_str("\"failed\"").expect("parse");
        assert_eq!(parsed, StepStatus::Failed);
    }

    #[test]
    fn empty_issue_context_serializes_all_keys_as_null() {
        let value = serde_json::to_value(IssueContext::none()).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "is_issue": false,
                "issue_type": null,
                "issue_id": null,
                "detected_pattern": null,
            })
        );
    }

    #[test]
    fn only_ok_is_terminal() {
        assert!(StepStatus::Ok.is_terminal());
        assert!(!StepStatus::Error.is_terminal());
        assert!(StepStatus::Failed.is_unsuccessful());
        assert!(!StepStatus::NotRun.is_unsuccessful());
    }
}
