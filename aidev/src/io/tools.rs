//! Supported assistant tools and local installation probing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::core::resolver::Availability;
use crate::io::process::run_command_with_timeout;

const VERSION_TIMEOUT: Duration = Duration::from_secs(5);
const VERSION_FLAGS: [&str; 3] = ["--version", "-v", "version"];

/// How a tool is driven: from a terminal, or only through its desktop app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Cli,
    Gui,
}

/// Static description of a supported tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub binary: &'static str,
    pub kind: ToolKind,
    /// Config file relative to the home directory.
    pub config_path: &'static str,
    pub install_url: &'static str,
}

pub static SUPPORTED_TOOLS: [ToolSpec; 7] = [
    ToolSpec {
        id: "claude",
        name: "Claude Code",
        binary: "claude",
        kind: ToolKind::Cli,
        config_path: ".claude.json",
        install_url: "https://docs.anthropic.com/en/docs/claude-code",
    },
    ToolSpec {
        id: "codex",
        name: "Codex CLI",
        binary: "codex",
        kind: ToolKind::Cli,
        config_path: ".codex/config.toml",
        install_url: "https://github.com/openai/codex",
    },
    ToolSpec {
        id: "cursor",
        name: "Cursor",
        binary: "cursor",
        kind: ToolKind::Gui,
        config_path: ".cursor/mcp.json",
        install_url: "https://cursor.com",
    },
    ToolSpec {
        id: "gemini",
        name: "Gemini CLI",
        binary: "gemini",
        kind: ToolKind::Cli,
        config_path: ".gemini/settings.json",
        install_url: "https://github.com/google-gemini/gemini-cli",
    },
    ToolSpec {
        id: "ollama",
        name: "Ollama",
        binary: "ollama",
        kind: ToolKind::Cli,
        config_path: ".ollama",
        install_url: "https://ollama.com/download",
    },
    ToolSpec {
        id: "aider",
        name: "Aider",
        binary: "aider",
        kind: ToolKind::Cli,
        config_path: ".aider.conf.yml",
        install_url: "https://aider.chat",
    },
    ToolSpec {
        id: "zed",
        name: "Zed",
        binary: "zed",
        kind: ToolKind::Gui,
        config_path: ".config/zed/settings.json",
        install_url: "https://zed.dev",
    },
];

pub fn tool_spec(id: &str) -> Option<&'static ToolSpec> {
    SUPPORTED_TOOLS.iter().find(|spec| spec.id == id)
}

/// Install hint shown when a tool is missing.
pub fn install_url(id: &str) -> &'static str {
    tool_spec(id).map_or("https://github.com", |spec| spec.install_url)
}

/// Detected state of one tool on this machine.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub id: String,
    pub name: String,
    pub binary: String,
    pub kind: ToolKind,
    pub installed: bool,
    pub binary_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub version: Option<String>,
    pub install_url: String,
}

impl ToolInfo {
    pub fn not_installed(spec: &ToolSpec) -> Self {
        Self {
            id: spec.id.to_string(),
            name: spec.name.to_string(),
            binary: spec.binary.to_string(),
            kind: spec.kind,
            installed: false,
            binary_path: None,
            config_path: dirs::home_dir().map(|home| home.join(spec.config_path)),
            version: None,
            install_url: spec.install_url.to_string(),
        }
    }
}

/// Tool availability probe.
pub trait ToolProbe {
    /// Locate a binary on this machine.
    fn locate(&self, binary: &str) -> Option<PathBuf>;

    /// Full detection for a supported tool id. Unsupported ids are an error.
    fn detect(&self, id: &str) -> Result<ToolInfo>;

    /// Whether an assistant id (or, for unknown ids, a binary of that name) is installed.
    fn is_installed(&self, id: &str) -> bool {
        let binary = tool_spec(id).map_or(id, |spec| spec.binary);
        self.locate(binary).is_some()
    }

    fn detect_all(&self) -> Vec<ToolInfo> {
        SUPPORTED_TOOLS
            .iter()
            .filter_map(|spec| self.detect(spec.id).ok())
            .collect()
    }
}

/// Adapts any probe to the resolver's availability seam.
pub struct ProbeAvailability<'a>(pub &'a dyn ToolProbe);

impl Availability for ProbeAvailability<'_> {
    fn is_installed(&self, assistant: &str) -> bool {
        self.0.is_installed(assistant)
    }
}

/// Probe backed by `PATH` lookup and `--version` calls.
pub struct SystemProbe;

impl ToolProbe for SystemProbe {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }

    #[instrument(skip(self))]
    fn detect(&self, id: &str) -> Result<ToolInfo> {
        let spec = tool_spec(id).ok_or_else(|| anyhow!("unsupported tool: {id}"))?;
        let mut info = ToolInfo::not_installed(spec);
        if let Some(path) = self.locate(spec.binary) {
            info.version = read_version(&path);
            info.installed = true;
            info.binary_path = Some(path);
        }
        debug!(installed = info.installed, version = ?info.version, "tool detected");
        Ok(info)
    }
}

fn read_version(binary: &std::path::Path) -> Option<String> {
    let program = binary.to_string_lossy().into_owned();
    VERSION_FLAGS.iter().find_map(|flag| {
        let argv = [program.clone(), (*flag).to_string()];
        let output = run_command_with_timeout(&argv, VERSION_TIMEOUT, 4096).ok()?;
        if output.timed_out || !output.status.success() {
            return None;
        }
        output
            .stdout_text()
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    })
}
