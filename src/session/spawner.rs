//! Agent CLI process spawner.
//!
//! Spawns the agent CLI for one session with:
//! - `kill_on_drop(true)` so an aborted actor never leaves the process behind.
//! - `env_clear()` + an allowlist so unrelated secrets from the host
//!   environment are not visible to the agent.
//! - stdout framed as NDJSON and stderr forwarded to `tracing` at DEBUG.
//!
//! No prompt is passed on the command line: the channel is opened empty and
//! the first message is written to stdin afterwards.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::stream::codec::NdjsonCodec;
use crate::{AppError, Result};

/// Environment variables inherited by the agent process.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LANG",
    "TERM",
    "TMPDIR",
    "RUST_LOG",
    // Agent CLI credentials and endpoint overrides.
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_BASE_URL",
    "CLAUDE_CONFIG_DIR",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "USERNAME",
    "APPDATA",
    "LOCALAPPDATA",
    "COMSPEC",
];

/// Environment variable carrying the execution ID into the agent process.
pub const EXECUTION_ID_ENV: &str = "AGENT_HITL_EXECUTION_ID";

/// Time the process gets to exit on its own after stdin closes.
pub const EXIT_GRACE: Duration = Duration::from_secs(5);

/// How to launch the agent CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnConfig {
    /// Agent CLI binary (for example `claude`).
    pub program: String,
    /// Full argument list.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub workspace_root: PathBuf,
}

/// A running agent process with its stdio captured.
#[derive(Debug)]
pub struct AgentProcess {
    /// Child handle; dropping it kills the process.
    pub child: Child,
    /// Agent stdin; `None` once closed.
    pub stdin: Option<ChildStdin>,
    /// NDJSON-framed agent stdout.
    pub stdout: FramedRead<ChildStdout, NdjsonCodec>,
    /// Task draining stderr into the log.
    pub stderr_task: JoinHandle<()>,
}

impl AgentProcess {
    /// Close stdin, wait up to [`EXIT_GRACE`] for the process to exit, then
    /// force-kill it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the force-kill fails.
    pub async fn shutdown(mut self, label: &str) -> Result<()> {
        drop(self.stdin.take());

        let result = match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(label, ?status, "agent process exited");
                Ok(())
            }
            Ok(Err(err)) => {
                warn!(label, %err, "error waiting for agent process");
                Ok(())
            }
            Err(_) => {
                warn!(
                    label,
                    "agent process did not exit within grace period, forcing kill"
                );
                self.child
                    .kill()
                    .await
                    .map_err(|err| AppError::Transport(format!("failed to kill agent: {err}")))
            }
        };

        self.stderr_task.abort();
        result
    }
}

/// Spawn the agent CLI for `label` (the actor name).
///
/// # Errors
///
/// - `AppError::Transport("failed to spawn agent: …")` on OS spawn failure.
/// - `AppError::Transport("failed to capture agent …")` if a pipe is missing.
pub fn spawn_agent(config: &SpawnConfig, label: &str, execution_id: &str) -> Result<AgentProcess> {
    let mut cmd = Command::new(&config.program);
    cmd.args(&config.args);

    cmd.env_clear();
    for &key in ALLOWED_ENV_VARS {
        if let Ok(val) = std::env::var(key) {
            cmd.env(key, val);
        }
    }
    cmd.env(EXECUTION_ID_ENV, execution_id);

    cmd.current_dir(&config.workspace_root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Transport(format!("failed to spawn agent: {err}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Transport("failed to capture agent stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Transport("failed to capture agent stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Transport("failed to capture agent stderr".into()))?;

    info!(label, pid = child.id(), program = %config.program, "agent process spawned");

    Ok(AgentProcess {
        child,
        stdin: Some(stdin),
        stdout: FramedRead::new(stdout, NdjsonCodec::new()),
        stderr_task: forward_stderr(label.to_owned(), stderr),
    })
}

fn forward_stderr(label: String, stderr: ChildStderr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if !line.is_empty() => {
                    debug!(label = %label, stderr = %line, "agent stderr");
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(err) => {
                    debug!(label = %label, %err, "agent stderr closed with error");
                    break;
                }
            }
        }
    })
}
