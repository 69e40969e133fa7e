//! Run manifest persistence with the load-locate-rewrite contract.
//!
//! Every mutation re-reads the file, applies the change to the fresh copy and
//! writes the whole manifest back before returning. Handed-off assistants
//! follow the same contract, so whatever they wrote since our last read
//! survives our next write. At most one writer is assumed at a time.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::types::StepStatus;
use crate::error::WorkflowError;
use crate::manifest::{RunManifest, StepRecord};

const MANIFEST_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/run_manifest.schema.json"
));

static MANIFEST_VALIDATOR: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(MANIFEST_SCHEMA).map_err(|err| err.to_string())?;
    validator_for(&schema).map_err(|err| err.to_string())
});

/// Result recorded by manual completion.
pub const MANUAL_COMPLETION_RESULT: &str = "Marked complete manually";

/// Current time as Unix epoch seconds.
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

/// One entry of a [`ManifestStore::batch_update`].
#[derive(Debug, Clone)]
pub struct StepUpdate {
    pub name: String,
    pub status: StepStatus,
    pub result: Value,
}

/// Handle on one manifest file and its last-read contents.
#[derive(Debug)]
pub struct ManifestStore {
    path: PathBuf,
    manifest: RunManifest,
}

impl ManifestStore {
    /// Write a new manifest and return a handle on it.
    pub fn create(path: impl Into<PathBuf>, manifest: RunManifest) -> Result<Self> {
        let store = Self {
            path: path.into(),
            manifest,
        };
        store.save()?;
        Ok(store)
    }

    /// Load and validate an existing manifest.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let manifest = load_manifest(&path)?;
        Ok(Self { path, manifest })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Contents as of the last read or write.
    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    pub fn reload(&mut self) -> Result<()> {
        self.manifest = load_manifest(&self.path)?;
        Ok(())
    }

    /// Persist the in-memory copy as-is (pretty JSON, trailing newline, atomic replace).
    pub fn save(&self) -> Result<()> {
        write_manifest(&self.path, &self.manifest)
    }

    /// Re-read, mutate the whole manifest, write it back.
    pub fn update<T>(&mut self, mutate: impl FnOnce(&mut RunManifest) -> Result<T>) -> Result<T> {
        self.reload()?;
        let out = mutate(&mut self.manifest)?;
        self.save()?;
        Ok(out)
    }

    /// Re-read, locate `name`, mutate that step, write the whole file back.
    #[instrument(skip(self, mutate), fields(path = %self.path.display()))]
    pub fn update_step<T>(
        &mut self,
        name: &str,
        mutate: impl FnOnce(&mut StepRecord) -> Result<T>,
    ) -> Result<T> {
        let path = self.path.clone();
        self.update(|manifest| {
            let step = manifest
                .step_mut(name)
                .ok_or_else(|| WorkflowError::StepNotInManifest {
                    step: name.to_string(),
                    manifest: path,
                })?;
            mutate(step)
        })
    }

    /// Record a final status and result for one step.
    ///
    /// Fails when the step is unknown or already `ok`.
    pub fn mark_step_complete(
        &mut self,
        name: &str,
        result: impl Into<Value>,
        status: StepStatus,
    ) -> Result<()> {
        let result = result.into();
        self.update_step(name, |step| {
            apply_status(step, status, result)?;
            debug!(step = %step.name, status = %status, "step marked");
            Ok(())
        })
    }

    pub fn mark_step_failed(&mut self, name: &str, error: &str) -> Result<()> {
        self.mark_step_complete(name, error, StepStatus::Failed)
    }

    /// Apply several updates with a single write.
    ///
    /// Prefer one [`Self::mark_step_complete`] per finished step: a crash
    /// midway through a batch loses every update in it. All names are checked
    /// before anything is applied.
    pub fn batch_update(&mut self, updates: Vec<StepUpdate>) -> Result<()> {
        let path = self.path.clone();
        self.update(|manifest| {
            for update in &updates {
                let step = manifest
                    .step(&update.name)
                    .ok_or_else(|| WorkflowError::StepNotInManifest {
                        step: update.name.clone(),
                        manifest: path.clone(),
                    })?;
                check_transition(step, update.status)?;
            }
            for update in updates {
                if let Some(step) = manifest.step_mut(&update.name) {
                    apply_status(step, update.status, update.result)?;
                }
            }
            Ok(())
        })
    }

    /// Names of steps still `not-run`, as currently on disk.
    pub fn validate(&mut self) -> Result<Vec<String>> {
        self.reload()?;
        Ok(self.manifest.pending_steps())
    }

    pub fn get_step(&self, name: &str) -> Option<&StepRecord> {
        self.manifest.step(name)
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.manifest.steps
    }

    pub fn completed_steps(&self) -> Vec<String> {
        self.manifest.completed_steps()
    }

    pub fn failed_steps(&self) -> Vec<String> {
        self.manifest.failed_steps()
    }

    /// Manually mark `not-run` steps as done, either all of them or only `only`.
    ///
    /// Sets the manifest's `completed_at` once every step is `ok`. Returns the
    /// names that changed; an unknown `only` name is an error.
    pub fn mark_pending_complete(&mut self, only: Option<&str>) -> Result<Vec<String>> {
        let path = self.path.clone();
        self.update(|manifest| {
            if let Some(name) = only.filter(|name| manifest.step(name).is_none()) {
                return Err(WorkflowError::StepNotInManifest {
                    step: name.to_string(),
                    manifest: path,
                }
                .into());
            }
            let now = now_epoch();
            let mut marked = Vec::new();
            for step in &mut manifest.steps {
                if only.is_some_and(|name| name != step.name) {
                    continue;
                }
                if step.status() != StepStatus::NotRun {
                    continue;
                }
                step.output.status = StepStatus::Ok;
                step.output.result = Value::String(MANUAL_COMPLETION_RESULT.to_string());
                step.output.completed_at = Some(now);
                marked.push(step.name.clone());
            }
            if !marked.is_empty() && manifest.all_ok() && manifest.completed_at.is_none() {
                manifest.completed_at = Some(now);
            }
            Ok(marked)
        })
    }

    pub fn set_completed_at(&mut self, at: i64) -> Result<()> {
        self.update(|manifest| {
            manifest.completed_at = Some(at);
            Ok(())
        })
    }
}

/// A step may only move from a non-`ok` status to a finished one.
fn check_transition(step: &StepRecord, status: StepStatus) -> Result<(), WorkflowError> {
    if step.status().is_terminal() {
        return Err(WorkflowError::StepAlreadyComplete {
            step: step.name.clone(),
        });
    }
    if status == StepStatus::NotRun {
        return Err(WorkflowError::StatusNotFinished {
            step: step.name.clone(),
        });
    }
    Ok(())
}

fn apply_status(step: &mut StepRecord, status: StepStatus, result: Value) -> Result<()> {
    check_transition(step, status)?;
    step.output.status = status;
    step.output.result = result;
    step.output.completed_at = Some(now_epoch());
    Ok(())
}

/// Load a manifest, checking it against the bundled schema and step-name uniqueness.
pub fn load_manifest(path: &Path) -> Result<RunManifest> {
    debug!(path = %path.display(), "loading manifest");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read manifest {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse manifest {}", path.display()))?;
    validate_manifest_value(&value).with_context(|| format!("invalid manifest {}", path.display()))?;
    let manifest: RunManifest = serde_json::from_value(value)
        .with_context(|| format!("deserialize manifest {}", path.display()))?;
    let mut seen = HashSet::new();
    if let Some(dup) = manifest.steps.iter().find(|step| !seen.insert(step.name.as_str())) {
        return Err(anyhow!(
            "invalid manifest {}: duplicate step name '{}'",
            path.display(),
            dup.name
        ));
    }
    Ok(manifest)
}

/// Check raw manifest JSON against the bundled schema.
pub fn validate_manifest_value(value: &Value) -> Result<()> {
    let validator = MANIFEST_VALIDATOR
        .as_ref()
        .map_err(|err| anyhow!("invalid manifest schema: {err}"))?;
    if !validator.is_valid(value) {
        let messages = validator
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "manifest schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

/// Atomically write a manifest (temp file + rename).
pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    debug!(path = %path.display(), steps = manifest.steps.len(), "writing manifest");
    let mut buf = serde_json::to_string_pretty(manifest).context("serialize manifest")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("manifest path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp manifest {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace manifest {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{manifest_with_steps, write_manifest_fixture};
    use serde_json::json;

    fn store_with(steps: &[(&str, StepStatus)]) -> (tempfile::TempDir, ManifestStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("demo-20240101-000000.json");
        write_manifest_fixture(&path, &manifest_with_steps(&path, steps)).expect("fixture");
        let store = ManifestStore::open(&path).expect("open");
        (temp, store)
    }

    #[test]
    fn mark_complete_round_trips_through_disk() {
        let (_temp, mut store) = store_with(&[("a", StepStatus::NotRun)]);
        store
            .mark_step_complete("a", json!({"summary": "done"}), StepStatus::Ok)
            .expect("mark");

        let reopened = ManifestStore::open(store.path()).expect("reopen");
        let step = reopened.get_step("a").expect("step");
        assert_eq!(step.output.status, StepStatus::Ok);
        assert_eq!(step.output.result, json!({"summary": "done"}));
        assert!(step.output.completed_at.is_some());
    }

    #[test]
    fn unknown_step_is_a_typed_error() {
        let (_temp, mut store) = store_with(&[("a", StepStatus::NotRun)]);
        let err = store
            .mark_step_complete("missing", "x", StepStatus::Ok)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkflowError>(),
            Some(WorkflowError::StepNotInManifest { .. })
        ));
    }

    #[test]
    fn ok_steps_are_never_rewritten() {
        let (_temp, mut store) = store_with(&[("a", StepStatus::Ok)]);
        let err = store.mark_step_failed("a", "boom").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkflowError>(),
            Some(WorkflowError::StepAlreadyComplete { .. })
        ));
    }

    #[test]
    fn steps_cannot_be_reset_to_not_run() {
        let (_temp, mut store) = store_with(&[("a", StepStatus::Failed), ("b", StepStatus::NotRun)]);
        let err = store
            .mark_step_complete("a", "reset", StepStatus::NotRun)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkflowError>(),
            Some(WorkflowError::StatusNotFinished { .. })
        ));

        let err = store
            .batch_update(vec![
                StepUpdate {
                    name: "b".to_string(),
                    status: StepStatus::Ok,
                    result: json!("done"),
                },
                StepUpdate {
                    name: "a".to_string(),
                    status: StepStatus::NotRun,
                    result: Value::Null,
                },
            ])
            .unwrap_err();
        assert!(err.downcast_ref::<WorkflowError>().is_some());

        let reopened = ManifestStore::open(store.path()).expect("reopen");
        let a = reopened.get_step("a").expect("a");
        assert_eq!(a.status(), StepStatus::Failed);
        assert_eq!(a.output.completed_at, None);
        assert_eq!(reopened.get_step("b").expect("b").status(), StepStatus::NotRun);
    }

    #[test]
    fn updates_keep_changes_written_by_other_processes() {
        let (_temp, mut store) = store_with(&[("a", StepStatus::NotRun), ("b", StepStatus::NotRun)]);

        // Another writer completes `a` behind our back.
        let mut other = ManifestStore::open(store.path()).expect("open other");
        other
            .mark_step_complete("a", "from assistant", StepStatus::Ok)
            .expect("other mark");

        store.mark_step_failed("b", "boom").expect("mark b");
        let reopened = ManifestStore::open(store.path()).expect("reopen");
        assert_eq!(reopened.completed_steps(), vec!["a"]);
        assert_eq!(reopened.failed_steps(), vec!["b"]);
    }

    #[test]
    fn validate_lists_not_run_steps() {
        let (_temp, mut store) = store_with(&[
            ("a", StepStatus::Ok),
            ("b", StepStatus::NotRun),
            ("c", StepStatus::Error),
        ]);
        assert_eq!(store.validate().expect("validate"), vec!["b"]);
    }

    #[test]
    fn batch_update_is_all_or_nothing() {
        let (_temp, mut store) = store_with(&[("a", StepStatus::NotRun), ("b", StepStatus::NotRun)]);
        let err = store
            .batch_update(vec![
                StepUpdate {
                    name: "a".to_string(),
                    status: StepStatus::Ok,
                    result: json!("done"),
                },
                StepUpdate {
                    name: "zzz".to_string(),
                    status: StepStatus::Ok,
                    result: json!("done"),
                },
            ])
            .unwrap_err();
        assert!(err.to_string().contains("zzz"));
        assert_eq!(store.validate().expect("validate"), vec!["a", "b"]);

        store
            .batch_update(vec![
                StepUpdate {
                    name: "a".to_string(),
                    status: StepStatus::Ok,
                    result: json!("done"),
                },
                StepUpdate {
                    name: "b".to_string(),
                    status: StepStatus::Failed,
                    result: json!("nope"),
                },
            ])
            .expect("batch");
        assert_eq!(store.completed_steps(), vec!["a"]);
        assert_eq!(store.failed_steps(), vec!["b"]);
    }

    #[test]
    fn mark_pending_complete_sets_completion_when_all_ok() {
        let (_temp, mut store) = store_with(&[("a", StepStatus::Ok), ("b", StepStatus::NotRun)]);
        let marked = store.mark_pending_complete(None).expect("mark");
        assert_eq!(marked, vec!["b"]);
        let step = store.get_step("b").expect("step");
        assert_eq!(step.output.result, json!(MANUAL_COMPLETION_RESULT));
        assert!(store.manifest().completed_at.is_some());
    }

    #[test]
    fn mark_pending_complete_single_step_leaves_others() {
        let (_temp, mut store) = store_with(&[("a", StepStatus::NotRun), ("b", StepStatus::NotRun)]);
        assert_eq!(store.mark_pending_complete(Some("b")).expect("mark"), vec!["b"]);
        assert_eq!(store.manifest().pending_steps(), vec!["a"]);
        assert!(store.manifest().completed_at.is_none());
        assert!(store.mark_pending_complete(Some("nope")).is_err());
    }

    #[test]
    fn schema_violations_are_reported_on_open() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bad.json");
        fs::write(&path, r#"{"workflow": "x", "steps": [{"name": "a"}]}"#).expect("write");
        let err = ManifestStore::open(&path).unwrap_err();
        assert!(format!("{err:#}").contains("schema validation failed"));
    }

    #[test]
    fn written_manifest_is_pretty_with_trailing_newline() {
        let (_temp, store) = store_with(&[("a", StepStatus::NotRun)]);
        store.save().expect("save");
        let contents = fs::read_to_string(store.path()).expect("read");
        assert!(contents.starts_with("{\n  \"workflow\""));
        assert!(contents.ends_with("}\n"));
    }
}
