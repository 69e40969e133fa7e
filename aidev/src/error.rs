//! Fatal workflow errors.
//!
//! These are lookup and resolution failures that abort the current command.
//! Per-step execution failures are not errors: they are recorded in the
//! manifest and retried (see [`crate::engine`]).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("step '{step}' not found in workflow '{workflow}'")]
    StepNotInWorkflow { step: String, workflow: String },

    #[error("step '{step}' not found in manifest {}", manifest.display())]
    StepNotInManifest { step: String, manifest: PathBuf },

    #[error("step '{step}' is already ok and cannot be rewritten")]
    StepAlreadyComplete { step: String },

    #[error("step '{step}' can only be marked ok, error or failed")]
    StatusNotFinished { step: String },

    #[error("unknown workflow '{name}' (available: {available})")]
    UnknownWorkflow { name: String, available: String },
}
