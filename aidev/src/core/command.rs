//! Mapping from assistant id to a concrete command line.
//!
//! Each assistant CLI takes its prompt differently. A command is only
//! produced when the assistant's binary is installed; GUI-only tools never
//! get one and are handled by the handoff controller instead.

/// Headless step execution or an interactive handoff session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    Headless,
    Interactive,
}

/// Prompt material for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct CommandPrompt<'a> {
    /// System/instruction prompt.
    pub prompt_text: &'a str,
    /// User content (ticket or user prompt preview).
    pub input: &'a str,
}

impl CommandPrompt<'_> {
    /// Single-argument form for assistants without a system prompt flag.
    pub fn merged(&self) -> String {
        format!("{}\n\nINPUT:\n{}", self.prompt_text, self.input)
    }
}

/// Build the argv for `assistant`, or `None` when no command form exists.
pub fn assistant_command(
    assistant: &str,
    prompt: &CommandPrompt<'_>,
    mode: CommandMode,
    ollama_model: &str,
    installed: impl Fn(&str) -> bool,
) -> Option<Vec<String>> {
    let cmd = |binary: &str, args: Vec<String>| -> Option<Vec<String>> {
        if !installed(binary) {
            return None;
        }
        let mut argv = vec![binary.to_string()];
        argv.extend(args);
        Some(argv)
    };

    match (assistant, mode) {
        ("claude", _) => cmd(
            "claude",
            vec![
                "--system-prompt".to_string(),
                prompt.prompt_text.to_string(),
                prompt.input.to_string(),
            ],
        ),
        ("codex", CommandMode::Headless) => cmd("codex", vec!["exec".to_string(), prompt.merged()]),
        ("codex", CommandMode::Interactive) => cmd("codex", vec![prompt.merged()]),
        ("gemini", CommandMode::Headless) => {
            cmd("gemini", vec!["--prompt".to_string(), prompt.merged()])
        }
        ("gemini", CommandMode::Interactive) => cmd(
            "gemini",
            vec!["--prompt-interactive".to_string(), prompt.merged()],
        ),
        ("ollama", _) => cmd(
            "ollama",
            vec![
                "run".to_string(),
                ollama_model.to_string(),
                "--prompt".to_string(),
                prompt.merged(),
            ],
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: CommandPrompt<'static> = CommandPrompt {
        prompt_text: "SYSTEM",
        input: "USER",
    };

    fn all_installed(_: &str) -> bool {
        true
    }

    #[test]
    fn claude_passes_system_prompt_flag() {
        let argv = assistant_command("claude", &PROMPT, CommandMode::Headless, "m", all_installed)
            .expect("command");
        assert_eq!(argv, vec!["claude", "--system-prompt", "SYSTEM", "USER"]);
    }

    #[test]
    fn codex_uses_exec_only_when_headless() {
        let headless =
            assistant_command("codex", &PROMPT, CommandMode::Headless, "m", all_installed)
                .expect("command");
        assert_eq!(headless, vec!["codex", "exec", "SYSTEM\n\nINPUT:\nUSER"]);
        let interactive =
            assistant_command("codex", &PROMPT, CommandMode::Interactive, "m", all_installed)
                .expect("command");
        assert_eq!(interactive, vec!["codex", "SYSTEM\n\nINPUT:\nUSER"]);
    }

    #[test]
    fn gemini_interactive_flag() {
        let argv = assistant_command("gemini", &PROMPT, CommandMode::Interactive, "m", all_installed)
            .expect("command");
        assert_eq!(argv[1], "--prompt-interactive");
    }

    #[test]
    fn ollama_uses_configured_model() {
        let argv = assistant_command(
            "ollama",
            &PROMPT,
            CommandMode::Headless,
            "llama3.1",
            all_installed,
        )
        .expect("command");
        assert_eq!(&argv[..4], ["ollama", "run", "llama3.1", "--prompt"]);
    }

    #[test]
    fn gui_and_unknown_tools_have_no_command() {
        assert!(assistant_command("cursor", &PROMPT, CommandMode::Headless, "m", all_installed).is_none());
        assert!(assistant_command("nope", &PROMPT, CommandMode::Headless, "m", all_installed).is_none());
    }

    #[test]
    fn missing_binary_has_no_command() {
        assert!(assistant_command("claude", &PROMPT, CommandMode::Headless, "m", |_| false).is_none());
    }
}
