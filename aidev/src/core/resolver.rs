//! Assistant selection for workflow steps.
//!
//! Precedence: CLI override > step/workflow tool > `AIDEV_DEFAULT_ASSISTANT`
//! > project default > `claude`. The availability fallback only applies when
//! a caller has no declared preference at all (e.g. handing off a manifest
//! with no pending step).

use tracing::debug;

/// Assistant used when nothing else is configured or installed.
pub const DEFAULT_ASSISTANT: &str = "claude";

/// Preference order for the availability fallback.
pub const FALLBACK_ORDER: [&str; 5] = ["claude", "codex", "cursor", "gemini", "ollama"];

/// Answers whether an assistant is installed locally.
pub trait Availability {
    fn is_installed(&self, assistant: &str) -> bool;
}

/// Ordered preferences for one step.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssistantPreferences<'a> {
    pub cli_override: Option<&'a str>,
    pub workflow_tool: Option<&'a str>,
    pub env_default: Option<&'a str>,
    pub project_default: Option<&'a str>,
}

pub struct AssistantResolver<'a> {
    availability: &'a dyn Availability,
}

impl<'a> AssistantResolver<'a> {
    pub fn new(availability: &'a dyn Availability) -> Self {
        Self { availability }
    }

    /// Pick the first non-empty preference. Never fails and never returns an empty id.
    pub fn resolve(&self, prefs: &AssistantPreferences<'_>) -> String {
        let chosen = [
            prefs.cli_override,
            prefs.workflow_tool,
            prefs.env_default,
            prefs.project_default,
            Some(DEFAULT_ASSISTANT),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .unwrap_or(DEFAULT_ASSISTANT);
        debug!(assistant = chosen, "resolved assistant");
        chosen.to_string()
    }

    /// First installed assistant in [`FALLBACK_ORDER`], else [`DEFAULT_ASSISTANT`]
    /// so that the launch failure downstream names a concrete tool.
    pub fn fallback_by_availability(&self) -> String {
        FALLBACK_ORDER
            .iter()
            .find(|candidate| self.availability.is_installed(candidate))
            .copied()
            .unwrap_or(DEFAULT_ASSISTANT)
            .to_string()
    }
}
