//! Bundled step prompts and handoff instructions.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

/// Appended to every rendered step prompt.
pub const PROPOSAL_EXEC_SUFFIX: &str = "

[Mode: proposal then execute]
1) Start with a concise proposal: goal, TODO checklist, risks/assumptions, and any approval needed.
2) Write the proposal as Markdown to the path declared in the run manifest (field: proposal_output).
3) If no approval gate is specified, immediately execute the TODOs now and apply edits/files directly.
4) Narrate actions briefly; do not stop after planning.
5) When done, state what you changed and where to find artifacts (edited file paths and the proposal_output path). If you could not write the file, paste the proposal inline and note the intended path.
";

const BUNDLED: [(&str, &str); 6] = [
    (
        "ticket_understander",
        include_str!("prompts/ticket_understander.md"),
    ),
    (
        "implementation_planner",
        include_str!("prompts/implementation_planner.md"),
    ),
    ("code_implementer", include_str!("prompts/code_implementer.md")),
    ("test_writer", include_str!("prompts/test_writer.md")),
    ("refactor_scout", include_str!("prompts/refactor_scout.md")),
    ("pr_reviewer", include_str!("prompts/pr_reviewer.md")),
];

const HANDOFF_INSTRUCTION: &str = include_str!("prompts/handoff.md");
const GUI_HANDOFF_TEMPLATE: &str = include_str!("prompts/gui_handoff.md");

/// Read-only keyed prompt lookup.
pub trait PromptLibrary {
    fn lookup(&self, prompt_id: &str) -> Option<String>;
}

/// Prompts compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct BundledPrompts;

impl PromptLibrary for BundledPrompts {
    fn lookup(&self, prompt_id: &str) -> Option<String> {
        BUNDLED
            .iter()
            .find(|(id, _)| *id == prompt_id)
            .map(|(_, text)| (*text).to_string())
    }
}

/// Step prompt text: the library entry (or a visible placeholder) plus the
/// proposal-then-execute suffix.
pub fn render_step_prompt(library: &dyn PromptLibrary, prompt_id: &str) -> String {
    let body = library
        .lookup(prompt_id)
        .unwrap_or_else(|| format!("[prompt {prompt_id} not found]"));
    format!("{body}{PROPOSAL_EXEC_SUFFIX}")
}

/// System instruction for an assistant taking over a manifest.
pub fn handoff_instruction() -> &'static str {
    HANDOFF_INSTRUCTION.trim_end()
}

/// User message pointing an assistant at a manifest.
pub fn handoff_user_prompt(manifest_path: &Path) -> String {
    format!("Read and execute the workflow manifest at: {}", manifest_path.display())
}

/// One line of the step list in a GUI prompt file.
#[derive(Debug, Clone, Serialize)]
pub struct GuiStepLine {
    pub name: String,
    pub status: String,
}

/// Render the standalone prompt file opened by GUI-only tools.
pub fn render_gui_prompt(
    manifest_path: &Path,
    workflow: &str,
    description: &str,
    steps: &[GuiStepLine],
) -> Result<String> {
    let env = Environment::new();
    let rendered = env
        .render_str(
            GUI_HANDOFF_TEMPLATE,
            context! {
                instruction => handoff_instruction(),
                manifest_path => manifest_path.display().to_string(),
                workflow => workflow,
                description => (!description.trim().is_empty()).then(|| description.trim()),
                steps => steps,
            },
        )
        .context("render gui handoff prompt")?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_prompts_are_non_empty() {
        for (id, _) in BUNDLED {
            let text = BundledPrompts.lookup(id).expect("bundled prompt");
            assert!(!text.trim().is_empty(), "{id} is empty");
        }
    }

    #[test]
    fn missing_prompt_renders_placeholder_with_suffix() {
        let text = render_step_prompt(&BundledPrompts, "nope");
        assert!(text.starts_with("[prompt nope not found]"));
        assert!(text.ends_with(PROPOSAL_EXEC_SUFFIX));
    }

    #[test]
    fn known_prompt_gets_suffix() {
        let text = render_step_prompt(&BundledPrompts, "ticket_understander");
        assert!(text.contains("[Mode: proposal then execute]"));
        assert!(!text.contains("not found"));
    }

    #[test]
    fn handoff_instruction_requires_per_step_updates() {
        assert!(handoff_instruction().contains("After completing EACH step"));
    }

    #[test]
    fn gui_prompt_lists_manifest_and_steps() {
        let rendered = render_gui_prompt(
            Path::new("/tmp/runs/demo-20240101-000000.json"),
            "demo",
            "",
            &[
                GuiStepLine {
                    name: "plan".to_string(),
                    status: "ok".to_string(),
                },
                GuiStepLine {
                    name: "build".to_string(),
                    status: "not-run".to_string(),
                },
            ],
        )
        .expect("render");
        assert!(rendered.contains("`/tmp/runs/demo-20240101-000000.json`"));
        assert!(rendered.contains("## Workflow Steps (2 total)"));
        assert!(rendered.contains("- build (not-run)"));
        assert!(!rendered.contains("Description:"));
    }
}
