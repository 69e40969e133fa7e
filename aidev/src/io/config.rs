//! Project configuration stored under `.aidev/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::budget::DEFAULT_PREVIEW_CHARS;

/// Engine configuration (TOML).
///
/// Edited by humans; every field has a default so a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Project-level default assistant, below the CLI, the step and
    /// `AIDEV_DEFAULT_ASSISTANT` in precedence.
    pub default_assistant: Option<String>,

    /// Characters of ticket/user text copied into each step's input snapshot.
    pub preview_chars: usize,

    /// Fixed pause between attempts of a failing step.
    pub retry_delay_ms: u64,

    /// Truncate captured assistant stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Model passed to `ollama run`.
    pub ollama_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_assistant: None,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            retry_delay_ms: 100,
            output_limit_bytes: 1_000_000,
            ollama_model: "llama3.1".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.preview_chars == 0 {
            return Err(anyhow!("preview_chars must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.ollama_model.trim().is_empty() {
            return Err(anyhow!("ollama_model must not be empty"));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = EngineConfig {
            default_assistant: Some("codex".to_string()),
            ..EngineConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "default_assistant = \"gemini\"\nretry_delay_ms = 0\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.default_assistant.as_deref(), Some("gemini"));
        assert_eq!(cfg.retry_delay(), Duration::ZERO);
        assert_eq!(cfg.preview_chars, DEFAULT_PREVIEW_CHARS);
    }

    #[test]
    fn zero_preview_budget_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "preview_chars = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("preview_chars"));
    }
}
