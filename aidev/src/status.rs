//! Progress summary of a run manifest.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{Local, TimeZone};

use crate::core::types::StepStatus;
use crate::manifest::RunManifest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLine {
    pub name: String,
    pub status: StepStatus,
    pub assistant: String,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub workflow: String,
    pub description: String,
    pub manifest_path: PathBuf,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    /// Set only when the proposal file exists on disk.
    pub proposal_output: Option<PathBuf>,
    pub steps: Vec<StepLine>,
    pub completed: usize,
    /// Steps in `error` or `failed`.
    pub errors: usize,
    pub pending: usize,
}

impl StatusReport {
    pub fn from_manifest(manifest: &RunManifest) -> Self {
        let steps: Vec<StepLine> = manifest
            .steps
            .iter()
            .map(|step| StepLine {
                name: step.name.clone(),
                status: step.status(),
                assistant: step.assistant.clone(),
            })
            .collect();
        let completed = steps.iter().filter(|s| s.status.is_terminal()).count();
        let errors = steps.iter().filter(|s| s.status.is_unsuccessful()).count();
        Self {
            workflow: manifest.workflow.clone(),
            description: manifest.description.clone(),
            manifest_path: manifest.manifest_path.clone(),
            created_at: manifest.created_at,
            completed_at: manifest.completed_at,
            proposal_output: manifest
                .proposal_output
                .is_file()
                .then(|| manifest.proposal_output.clone()),
            pending: steps.len() - completed - errors,
            steps,
            completed,
            errors,
        }
    }

    /// Work left a proposal behind, but nobody marked a step.
    pub fn work_detected_unmarked(&self) -> bool {
        self.proposal_output.is_some() && self.completed == 0 && self.errors == 0
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Workflow: {}", self.workflow);
        if !self.description.is_empty() {
            let _ = writeln!(out, "Description: {}", self.description);
        }
        let _ = writeln!(out, "Manifest: {}", self.manifest_path.display());
        if self.created_at > 0 {
            let _ = writeln!(out, "Created: {}", format_epoch(self.created_at));
        }
        match self.completed_at {
            Some(at) => {
                let _ = writeln!(out, "Completed: {}", format_epoch(at));
            }
            None => out.push_str("In progress\n"),
        }
        if let Some(proposal) = &self.proposal_output {
            let _ = writeln!(out, "Proposal output: {}", proposal.display());
        }

        out.push('\n');
        let width = self.steps.iter().map(|s| s.name.chars().count()).max().unwrap_or(4).max(4);
        for step in &self.steps {
            let mut label = step.status.to_string();
            if step.status == StepStatus::NotRun && self.proposal_output.is_some() {
                label.push_str(" (work detected)");
            }
            let _ = writeln!(out, "  {:<width$}  {:<24}  {}", step.name, label, step.assistant);
        }

        let _ = writeln!(
            out,
            "\nSummary: {} completed, {} errors, {} pending",
            self.completed, self.errors, self.pending
        );
        if self.work_detected_unmarked() {
            let name = self
                .manifest_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "Work detected but steps not marked complete. Run:\n  aidev workflow mark-complete {name}"
            );
        }
        if self.errors > 0 {
            out.push_str("Some steps failed. Check the manifest for details.\n");
        }
        out
    }
}

fn format_epoch(secs: i64) -> String {
    Local
        .timestamp_opt(secs, 0)
        .single()
        .map_or_else(|| secs.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}
