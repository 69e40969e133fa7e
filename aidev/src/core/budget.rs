//! Character budgets for text copied into manifests and results.

/// Characters of ticket/user text kept in a step's input snapshot.
pub const DEFAULT_PREVIEW_CHARS: usize = 4000;
/// Characters of the rendered prompt echoed back in a runner result.
pub const PROMPT_ECHO_CHARS: usize = 2000;
/// Characters of stderr quoted in a failed-step error message.
pub const STDERR_QUOTE_CHARS: usize = 200;

/// Keep at most `budget` characters of `text`, never splitting a code point.
pub fn preview(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
