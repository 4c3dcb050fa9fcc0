//! Terminal result of a conversation.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::execution::ExecutionId;

/// Why a conversation ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EndReason {
    /// The human typed a termination keyword.
    Completed,
    /// A `complete` turn ended the conversation under auto-complete.
    TaskCompleted,
    /// The human cancelled or no reply object was returned.
    EndedByUser,
    /// The human submitted an empty reply.
    EmptyResponse,
    /// The actor was idle past its threshold.
    TimedOut,
    /// The iteration cap was reached.
    MaxIterations(u32),
    /// Actor failures exhausted the retry budget.
    FailedAfterRetries,
    /// Any other fault, as a short excerpt.
    Error(String),
}

impl EndReason {
    /// Whether the conversation ended on a failure path.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FailedAfterRetries | Self::Error(_))
    }
}

impl Display for EndReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("conversation completed"),
            Self::TaskCompleted => f.write_str("task completed"),
            Self::EndedByUser => f.write_str("conversation ended by user"),
            Self::EmptyResponse => f.write_str("empty response - conversation ended"),
            Self::TimedOut => f.write_str("session timed out"),
            Self::MaxIterations(cap) => write!(f, "max iterations reached ({cap})"),
            Self::FailedAfterRetries => f.write_str("session failed after retries"),
            Self::Error(excerpt) => write!(f, "error: {excerpt}"),
        }
    }
}

/// Everything the caller receives once the conversation is terminated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationOutcome {
    /// Conversation identity.
    pub execution_id: ExecutionId,
    /// Termination reason.
    pub reason: EndReason,
    /// Turn count at termination.
    pub iterations: u32,
    /// Actor failures recovered during the conversation.
    pub retry_count: u32,
    /// Termination timestamp.
    pub ended_at: DateTime<Utc>,
    /// Rendered markdown summary or final result.
    pub body: String,
}
