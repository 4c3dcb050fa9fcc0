//! Global configuration parsing, validation, and environment overrides.

use std::env;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::session::registry::RegistryConfig;
use crate::session::spawner::SpawnConfig;
use crate::{AppError, Result};

/// Whether a `complete` turn ends the whole conversation.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionMode {
    /// A complete turn skips the human pause and finalizes.
    #[default]
    AutoComplete,
    /// A complete turn only ends the turn; the human decides when to stop.
    Continuous,
}

impl CompletionMode {
    /// Configuration label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoComplete => "auto-complete",
            Self::Continuous => "continuous",
        }
    }
}

impl Display for CompletionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionMode {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto-complete" => Ok(Self::AutoComplete),
            "continuous" => Ok(Self::Continuous),
            other => Err(AppError::Config(format!(
                "unknown completion mode: {other}"
            ))),
        }
    }
}

/// Conversation loop policy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ConversationConfig {
    /// Completion policy.
    #[serde(default)]
    pub completion_mode: CompletionMode,
    /// Iteration cap.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Actor failures tolerated before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Idle threshold for the session actor.
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
    /// Collect and store generated files on auto-completion.
    #[serde(default = "default_true")]
    pub upload_files: bool,
    /// Extensions and path components never treated as generated files.
    #[serde(default = "default_file_exclusions")]
    pub file_exclusions: Vec<String>,
}

impl ConversationConfig {
    /// Idle threshold as a [`Duration`].
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            completion_mode: CompletionMode::default(),
            max_turns: default_max_turns(),
            max_retries: default_max_retries(),
            idle_timeout_seconds: default_idle_timeout_seconds(),
            upload_files: true,
            file_exclusions: default_file_exclusions(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_turns() -> u32 {
    50
}

fn default_max_retries() -> u32 {
    1
}

fn default_idle_timeout_seconds() -> u64 {
    660
}

fn default_max_concurrent_sessions() -> u32 {
    4
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".agent-hitl/out")
}

fn default_host_cli() -> String {
    "claude".into()
}

fn default_host_cli_args() -> Vec<String> {
    [
        "--print",
        "--verbose",
        "--output-format",
        "stream-json",
        "--input-format",
        "stream-json",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_permission_mode() -> String {
    "acceptEdits".into()
}

fn default_file_exclusions() -> Vec<String> {
    [
        // Source code
        ".py",
        ".pyc",
        ".pyo",
        ".pyd",
        // Config files
        ".json",
        ".yaml",
        ".yml",
        ".toml",
        ".ini",
        // Packaging artifacts
        ".egg-info",
        ".dist-info",
        "__pycache__",
        // Virtual environments
        ".venv",
        "venv",
        "env",
        // Version control
        ".git",
        ".gitignore",
        ".gitattributes",
        // IDE files
        ".vscode",
        ".idea",
        ".pytest_cache",
        // Other
        ".md",
        ".txt",
        ".log",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Working directory of the agent and root of the artifact scan.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Destination for uploaded artifacts; relative paths resolve against
    /// the workspace root.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Agent CLI binary.
    #[serde(default = "default_host_cli")]
    pub host_cli: String,
    /// Arguments passed to the agent CLI before the permission flag.
    #[serde(default = "default_host_cli_args")]
    pub host_cli_args: Vec<String>,
    /// Value of `--permission-mode`; empty omits the flag.
    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,
    /// Maximum live session actors.
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: u32,
    /// Conversation loop policy.
    #[serde(default)]
    pub conversation: ConversationConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            output_dir: default_output_dir(),
            host_cli: default_host_cli(),
            host_cli_args: default_host_cli_args(),
            permission_mode: default_permission_mode(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
            conversation: ConversationConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `COMPLETION_MODE`, `UPLOAD_FILES`, and `MAX_TURNS` from the
    /// process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unrecognised values are logged and leave the setting unchanged.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("COMPLETION_MODE") {
            match raw.parse::<CompletionMode>() {
                Ok(mode) => {
                    self.conversation.completion_mode = mode;
                    info!(completion_mode = %mode, "completion mode overridden");
                }
                Err(_) if raw.trim().is_empty() => {}
                Err(err) => warn!(%err, "ignoring COMPLETION_MODE"),
            }
        }

        if let Some(raw) = lookup("UPLOAD_FILES") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "true" => self.conversation.upload_files = true,
                "false" => self.conversation.upload_files = false,
                "" => {}
                other => warn!(value = other, "ignoring UPLOAD_FILES"),
            }
        }

        if let Some(raw) = lookup("MAX_TURNS") {
            match raw.trim().parse::<u32>() {
                Ok(turns) if turns > 0 => {
                    self.conversation.max_turns = turns;
                    info!(max_turns = turns, "max turns overridden");
                }
                _ => warn!(
                    value = %raw,
                    max_turns = self.conversation.max_turns,
                    "invalid MAX_TURNS, keeping current value"
                ),
            }
        }
    }

    /// Check limits and canonicalize the workspace root.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` on a zero limit, an empty CLI name, or a
    /// workspace root that does not exist.
    pub fn validate(&mut self) -> Result<()> {
        if self.max_concurrent_sessions == 0 {
            return Err(AppError::Config(
                "max_concurrent_sessions must be greater than zero".into(),
            ));
        }

        if self.conversation.max_turns == 0 {
            return Err(AppError::Config(
                "conversation.max_turns must be greater than zero".into(),
            ));
        }

        if self.conversation.idle_timeout_seconds == 0 {
            return Err(AppError::Config(
                "conversation.idle_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.host_cli.trim().is_empty() {
            return Err(AppError::Config("host_cli must not be empty".into()));
        }

        let canonical_root = self
            .workspace_root
            .canonicalize()
            .map_err(|err| AppError::Config(format!("workspace_root invalid: {err}")))?;
        self.workspace_root = canonical_root;

        Ok(())
    }

    /// Absolute artifact destination.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            self.workspace_root.join(&self.output_dir)
        }
    }

    /// Launch parameters for the agent CLI.
    #[must_use]
    pub fn spawn_config(&self) -> SpawnConfig {
        let mut args = self.host_cli_args.clone();
        if !self.permission_mode.is_empty() {
            args.push("--permission-mode".into());
            args.push(self.permission_mode.clone());
        }
        SpawnConfig {
            program: self.host_cli.clone(),
            args,
            workspace_root: self.workspace_root.clone(),
        }
    }

    /// Registry sizing derived from this configuration.
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            max_concurrent_sessions: usize::try_from(self.max_concurrent_sessions)
                .unwrap_or(usize::MAX),
            idle_timeout: self.conversation.idle_timeout(),
        }
    }
}
