//! Collaborators the orchestrator calls out to.
//!
//! Each seam is a trait so a workflow engine, a terminal, or a test double
//! can stand behind it. Async methods return boxed futures to keep the
//! traits object-safe.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::models::execution::ContinuationToken;
use crate::models::turn::{TurnStatus, UserMessage};
use crate::Result;

/// Boxed future returned by boundary traits.
pub type BoundaryFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the human sees at the pause boundary.
///
/// Only the user-facing channel is included; context messages are emitted
/// as progress notices before the pause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PausePrompt {
    /// Resume marker for an external workflow engine.
    pub token: ContinuationToken,
    /// Turn number being presented.
    pub iteration: u32,
    /// User-facing messages of the turn.
    pub messages: Vec<UserMessage>,
    /// How the turn ended.
    pub status: TurnStatus,
}

/// Reply collected at the pause boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HumanReply {
    /// Free-text response. Trimmed by the orchestrator.
    #[serde(default)]
    pub response: String,
    /// The human declined to continue.
    #[serde(default)]
    pub cancelled: bool,
}

impl HumanReply {
    /// A plain text reply.
    #[must_use]
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            cancelled: false,
        }
    }

    /// A cancellation.
    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            response: String::new(),
            cancelled: true,
        }
    }
}

/// The single suspension point of a conversation.
pub trait HumanInput: Send + Sync {
    /// Present `prompt` and wait, without any timeout, for the human.
    ///
    /// `Ok(None)` means no reply object was produced and is treated like a
    /// cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::HumanInput`](crate::AppError::HumanInput) if the
    /// boundary itself fails.
    fn request_input(&self, prompt: PausePrompt) -> BoundaryFuture<'_, Result<Option<HumanReply>>>;
}

/// Fire-and-forget status output.
pub trait ProgressSink: Send + Sync {
    /// Emit a human-readable notice.
    fn notice(&self, text: &str);
}

/// Discovery and persistence of files the agent generated.
pub trait ArtifactCollector: Send + Sync {
    /// Candidate generated files, skipping anything matching `exclusions`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Artifact`](crate::AppError::Artifact) if the scan
    /// cannot run.
    fn collect<'a>(&'a self, exclusions: &'a [String]) -> BoundaryFuture<'a, Result<Vec<PathBuf>>>;

    /// Persist `paths`, returning the file names that were stored.
    ///
    /// Per-file failures are reported through `progress`, not as errors.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Artifact`](crate::AppError::Artifact) if the
    /// destination is unusable.
    fn upload<'a>(
        &'a self,
        paths: &'a [PathBuf],
        progress: &'a dyn ProgressSink,
    ) -> BoundaryFuture<'a, Result<Vec<String>>>;
}
