//! CLI tests for `aidev workflow` commands.
//!
//! Spawns the aidev binary inside a temp project and checks exit codes and
//! the manifest files it leaves behind.

use std::process::{Command, Output};

use aidev::core::types::StepStatus;
use aidev::exit_codes;
use aidev::io::manifest_store::load_manifest;
use aidev::test_support::{TestProject, manifest_with_steps, write_manifest_fixture};

fn aidev(project: &TestProject, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_aidev"))
        .current_dir(project.root())
        .env_remove("AIDEV_DEFAULT_ASSISTANT")
        .args(args)
        .output()
        .expect("spawn aidev")
}

fn fixture(project: &TestProject, file_name: &str, steps: &[(&str, StepStatus)]) {
    let path = project.paths().runs_dir.join(file_name);
    write_manifest_fixture(&path, &manifest_with_steps(&path, steps)).expect("write fixture");
}

#[test]
fn validate_exit_code_tracks_step_states() {
    let project = TestProject::new().expect("project");
    fixture(&project, "done.json", &[("a", StepStatus::Ok)]);
    fixture(&project, "pending.json", &[("a", StepStatus::Ok), ("b", StepStatus::NotRun)]);
    fixture(&project, "failed.json", &[("a", StepStatus::Failed), ("b", StepStatus::NotRun)]);

    let cases = [
        ("done.json", exit_codes::OK),
        ("pending.json", exit_codes::PENDING),
        ("failed.json", exit_codes::FAILED),
    ];
    for (file_name, expected) in cases {
        let output = aidev(&project, &["workflow", "validate", file_name]);
        assert_eq!(output.status.code(), Some(expected), "{file_name}");
    }
}

#[test]
fn mark_complete_then_validate_passes() {
    let project = TestProject::new().expect("project");
    fixture(&project, "run.json", &[("a", StepStatus::NotRun), ("b", StepStatus::NotRun)]);

    let output = aidev(&project, &["workflow", "mark-complete", "run", "--step", "a"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let output = aidev(&project, &["workflow", "validate", "run"]);
    assert_eq!(output.status.code(), Some(exit_codes::PENDING));

    let output = aidev(&project, &["workflow", "mark-complete", "run"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Marked complete: b"), "{stdout}");

    let manifest = load_manifest(&project.paths().runs_dir.join("run.json")).expect("load");
    assert!(manifest.all_ok());
    assert!(manifest.completed_at.is_some());
}

#[test]
fn status_prints_summary() {
    let project = TestProject::new().expect("project");
    fixture(&project, "status.json", &[("a", StepStatus::Ok), ("b", StepStatus::Error)]);

    let output = aidev(&project, &["workflow", "status", "status.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Workflow: demo"), "{stdout}");
    assert!(stdout.contains("Summary: 1 completed, 1 errors, 0 pending"), "{stdout}");
}

#[test]
fn run_writes_manifest_for_bundled_workflow() {
    let project = TestProject::new().expect("project");

    let output = aidev(
        &project,
        &["workflow", "run", "plan_ticket", "--ticket", "PROJ-7", "--tool", "codex"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let manifests = project.manifests().expect("list");
    assert_eq!(manifests.len(), 1);
    let manifest = load_manifest(&manifests[0]).expect("load");
    assert_eq!(manifest.workflow, "plan_ticket");
    assert_eq!(manifest.ticket_arg.as_deref(), Some("PROJ-7"));
    assert!(manifest.steps.iter().all(|step| step.assistant == "codex"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&manifests[0].display().to_string()), "{stdout}");
}

#[test]
fn unknown_workflow_is_invalid() {
    let project = TestProject::new().expect("project");

    let output = aidev(&project, &["workflow", "run", "does_not_exist"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown workflow 'does_not_exist'"), "{stderr}");
    assert!(project.manifests().expect("list").is_empty());
}

#[test]
fn corrupt_manifest_is_invalid() {
    let project = TestProject::new().expect("project");
    let path = project.paths().runs_dir.join("broken.json");
    std::fs::write(&path, "{\"workflow\": 3}\n").expect("write");

    let output = aidev(&project, &["workflow", "validate", "broken.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}
