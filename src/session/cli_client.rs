//! [`SubprocessClient`] backed by an agent CLI in `stream-json` mode.

use std::collections::VecDeque;

use futures_util::StreamExt;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::models::execution::ExecutionId;
use crate::session::client::{ClientFactory, ClientFuture, SubprocessClient};
use crate::session::spawner::{spawn_agent, AgentProcess, SpawnConfig};
use crate::stream::event::{parse_line, StreamEvent};
use crate::{AppError, Result};

/// Agent CLI client for one session.
///
/// A turn's stream ends at a `result` line (the classifier stops there) or
/// when the process closes stdout. After stdout closes every further
/// `send` fails with [`AppError::Transport`].
#[derive(Debug)]
pub struct CliClient {
    config: SpawnConfig,
    execution_id: String,
    label: String,
    process: Option<AgentProcess>,
    pending: VecDeque<StreamEvent>,
    exited: bool,
}

impl CliClient {
    /// Create an unopened client.
    #[must_use]
    pub fn new(config: SpawnConfig, execution_id: &ExecutionId) -> Self {
        Self {
            config,
            execution_id: execution_id.to_string(),
            label: execution_id.actor_name(),
            process: None,
            pending: VecDeque::new(),
            exited: false,
        }
    }

    async fn write_message(&mut self, message: String) -> Result<()> {
        if self.exited {
            return Err(AppError::Transport(format!(
                "{}: agent process has exited",
                self.label
            )));
        }

        let stdin = self
            .process
            .as_mut()
            .and_then(|process| process.stdin.as_mut())
            .ok_or_else(|| AppError::Transport(format!("{}: channel not open", self.label)))?;

        let line = json!({
            "type": "user",
            "message": { "role": "user", "content": message }
        });
        let mut bytes = serde_json::to_vec(&line)
            .map_err(|e| AppError::Transport(format!("failed to serialise message: {e}")))?;
        bytes.push(b'\n');

        stdin
            .write_all(&bytes)
            .await
            .map_err(|e| AppError::Transport(format!("write failed: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| AppError::Transport(format!("flush failed: {e}")))
    }

    async fn read_event(&mut self) -> Result<Option<StreamEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let Some(process) = self.process.as_mut() else {
                return Ok(None);
            };

            match process.stdout.next().await {
                None => {
                    debug!(label = %self.label, "agent stdout closed");
                    self.exited = true;
                    return Ok(None);
                }
                Some(Err(err)) => return Err(err),
                Some(Ok(line)) => match parse_line(&line) {
                    Ok(events) => self.pending.extend(events),
                    Err(err) => {
                        warn!(label = %self.label, %err, raw_line = %line, "skipping unparseable line");
                    }
                },
            }
        }
    }
}

impl SubprocessClient for CliClient {
    fn open(&mut self) -> ClientFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.process.is_some() {
                return Ok(());
            }
            let process = spawn_agent(&self.config, &self.label, &self.execution_id)?;
            self.process = Some(process);
            self.exited = false;
            Ok(())
        })
    }

    fn send(&mut self, message: &str) -> ClientFuture<'_, Result<()>> {
        let message = message.to_owned();
        Box::pin(async move {
            self.pending.clear();
            self.write_message(message).await
        })
    }

    fn next_event(&mut self) -> ClientFuture<'_, Result<Option<StreamEvent>>> {
        Box::pin(self.read_event())
    }

    fn close(&mut self) -> ClientFuture<'_, Result<()>> {
        Box::pin(async move {
            self.pending.clear();
            match self.process.take() {
                Some(process) => process.shutdown(&self.label).await,
                None => Ok(()),
            }
        })
    }
}

/// Builds [`CliClient`]s from a shared [`SpawnConfig`].
#[derive(Debug, Clone)]
pub struct CliClientFactory {
    config: SpawnConfig,
}

impl CliClientFactory {
    /// Create a factory.
    #[must_use]
    pub fn new(config: SpawnConfig) -> Self {
        Self { config }
    }
}

impl ClientFactory for CliClientFactory {
    fn create(&self, execution_id: &ExecutionId) -> Box<dyn SubprocessClient> {
        Box::new(CliClient::new(self.config.clone(), execution_id))
    }
}
