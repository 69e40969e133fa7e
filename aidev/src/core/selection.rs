//! Step subrange selection for `run_workflow`.

use crate::error::WorkflowError;
use crate::workflow::{WorkflowDefinition, WorkflowStep};

/// Select the steps to materialize into a manifest.
///
/// - `from_step` starts at the first step with that name; an unknown name is an error.
/// - `step_only` keeps just the first selected step.
pub fn select_steps<'a>(
    workflow: &'a WorkflowDefinition,
    from_step: Option<&str>,
    step_only: bool,
) -> Result<&'a [WorkflowStep], WorkflowError> {
    let start = match from_step {
        Some(name) => workflow
            .steps
            .iter()
            .position(|step| step.name == name)
            .ok_or_else(|| WorkflowError::StepNotInWorkflow {
                step: name.to_string(),
                workflow: workflow.name.clone(),
            })?,
        None => 0,
    };
    let selected = &workflow.steps[start..];
    if step_only {
        return Ok(&selected[..selected.len().min(1)]);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_steps() -> WorkflowDefinition {
        WorkflowDefinition::new(
            "demo",
            "demo workflow",
            vec![
                WorkflowStep::new("a", "p_a"),
                WorkflowStep::new("b", "p_b"),
                WorkflowStep::new("c", "p_c"),
            ],
        )
    }

    fn names(steps: &[WorkflowStep]) -> Vec<&str> {
        steps.iter().map(|step| step.name.as_str()).collect()
    }

    #[test]
    fn selects_all_steps_by_default() {
        let wf = three_steps();
        let steps = select_steps(&wf, None, false).expect("select");
        assert_eq!(names(steps), vec!["a", "b", "c"]);
    }

    #[test]
    fn from_step_skips_earlier_steps() {
        let wf = three_steps();
        let steps = select_steps(&wf, Some("b"), false).expect("select");
        assert_eq!(names(steps), vec!["b", "c"]);
    }

    #[test]
    fn step_only_keeps_one_step() {
        let wf = three_steps();
        assert_eq!(names(select_steps(&wf, None, true).expect("select")), vec!["a"]);
        assert_eq!(
            names(select_steps(&wf, Some("c"), true).expect("select")),
            vec!["c"]
        );
    }

    #[test]
    fn unknown_from_step_is_an_error() {
        let wf = three_steps();
        let err = select_steps(&wf, Some("missing"), false).unwrap_err();
        assert!(matches!(err, WorkflowError::StepNotInWorkflow { .. }));
        assert!(err.to_string().contains("'missing'"));
    }

    #[test]
    fn step_only_on_empty_workflow_is_empty() {
        let wf = WorkflowDefinition::new("empty", "", Vec::new());
        assert!(select_steps(&wf, None, true).expect("select").is_empty());
    }
}
