//! Stable exit codes for aidev CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid input, unreadable manifest, unknown workflow or any other error.
pub const INVALID: i32 = 1;
/// `aidev workflow validate` found steps still `not-run`.
pub const PENDING: i32 = 2;
/// `aidev workflow validate` found a step in `error` or `failed`, or a
/// handoff did not complete.
pub const FAILED: i32 = 3;
