/// Seconds a step may run when the catalog does not say otherwise.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowStep {
    pub name: String,
    /// Prompt id looked up in the prompt library.
    pub prompt: String,
    pub tool: Option<String>,
    pub timeout_sec: u64,
    /// Extra attempts after the first one fails.
    pub retries: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: String,
    pub steps: Vec<WorkflowStep>,
    /// Assistant for steps that do not name their own.
    pub tool: Option<String>,
    /// Write a local draft ticket next to the run manifest.
    pub draft_ticket: bool,
}

impl WorkflowStep {
    pub fn new(name: &str, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            prompt: prompt.to_string(),
            tool: None,
            timeout_sec: DEFAULT_STEP_TIMEOUT_SECS,
            retries: 0,
        }
    }
}

impl WorkflowDefinition {
    pub fn new(name: &str, description: &str, steps: Vec<WorkflowStep>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            steps,
            tool: None,
            draft_ticket: false,
        }
    }
}
