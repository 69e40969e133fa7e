//! Workflow engine for AI coding assistants.
//!
//! A workflow is an ordered list of prompt steps. Running one produces a JSON
//! run manifest that records, per step, which assistant runs it, what it was
//! given and how it ended. The manifest is then executed headlessly, handed to
//! an interactive assistant, or both; either side updates it step by step.
//!
//! - **[`core`]**: pure, deterministic logic (issue classification, assistant
//!   resolution, step selection, command mapping). No I/O.
//! - **[`io`]**: side effects (catalog and manifest files, processes, tool
//!   probing, config). Isolated behind traits so tests can swap them.
//!
//! [`engine`], [`handoff`] and [`status`] combine the two into CLI commands.

pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod handoff;
pub mod io;
pub mod logging;
pub mod manifest;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
