//! Environment variable lookup.

use std::collections::HashMap;

/// Variable naming the default assistant below CLI and per-step choices.
pub const DEFAULT_ASSISTANT_VAR: &str = "AIDEV_DEFAULT_ASSISTANT";

/// Read-only environment access, injected so tests never touch the process env.
pub trait EnvLookup {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}
