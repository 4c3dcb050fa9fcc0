//! Conversation identity and orchestrator progress state.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of the derived actor name.
const ACTOR_NAME_PREFIX: &str = "agent-session-";

/// Stable identifier joining one orchestrator invocation to one actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    /// Wrap a caller-supplied identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name given to the actor hosting this conversation's session.
    #[must_use]
    pub fn actor_name(&self) -> String {
        format!("{ACTOR_NAME_PREFIX}{}", self.0)
    }
}

impl Display for ExecutionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Orchestrator lifecycle phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Resolving or creating the actor.
    Initializing,
    /// A connect or query is in flight.
    AwaitingActorResponse,
    /// Suspended at the human-input boundary.
    AwaitingHumanInput,
    /// Building the terminal result.
    Finalizing,
    /// Actor torn down; nothing more happens.
    Terminated,
}

/// Mutable progress of one conversation, owned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorState {
    /// Conversation identity.
    pub execution_id: ExecutionId,
    /// Turns surfaced to the human so far.
    pub iteration: u32,
    /// Actor failures recovered so far.
    pub retry_count: u32,
    /// Current lifecycle phase.
    pub phase: Phase,
}

impl OrchestratorState {
    /// Fresh state for a new conversation.
    #[must_use]
    pub fn new(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            iteration: 0,
            retry_count: 0,
            phase: Phase::Initializing,
        }
    }

    /// Snapshot the state needed to resume after the human-input pause.
    #[must_use]
    pub fn continuation_token(&self) -> ContinuationToken {
        ContinuationToken {
            execution_id: self.execution_id.clone(),
            phase: self.phase,
            iteration: self.iteration,
        }
    }
}

/// Durable marker handed out at the suspension point.
///
/// A workflow engine that tears down the orchestrator between pauses
/// persists this instead of an in-memory stack frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContinuationToken {
    /// Conversation identity; also the registry key of the live actor.
    pub execution_id: ExecutionId,
    /// Phase at the time of suspension.
    pub phase: Phase,
    /// Iteration at the time of suspension.
    pub iteration: u32,
}
