//! Per-turn output of the agent session, split into two channels.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a turn's event stream ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The stream was exhausted without a terminal event; the agent is
    /// waiting for the next human message.
    Ready,
    /// A terminal `result` event was observed.
    Complete,
}

impl TurnStatus {
    /// Wire label (`ready` / `complete`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Complete => "complete",
        }
    }
}

/// A message destined for the human-facing channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserMessage {
    /// Plain assistant text.
    Text {
        /// Text as emitted by the agent.
        content: String,
    },
}

impl UserMessage {
    /// Build a text message.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Text body of the message.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Text { content } => content,
        }
    }
}

/// A message destined for the context/diagnostic channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextMessage {
    /// Reasoning trace.
    Thinking {
        /// Reasoning text.
        content: String,
        /// Opaque signature attached by the model.
        signature: String,
    },
    /// Tool invocation request.
    ToolUse {
        /// Tool name.
        name: String,
        /// Tool call identifier.
        id: String,
        /// Tool arguments.
        input: Value,
    },
    /// Tool invocation result.
    ToolResult {
        /// Identifier of the originating tool call.
        tool_use_id: String,
        /// Result payload (string or structured blocks).
        content: Value,
        /// Whether the tool reported failure.
        #[serde(default)]
        is_error: bool,
    },
    /// System or diagnostic event.
    System {
        /// Event subtype (for example `init`).
        subtype: String,
        /// Raw event payload.
        data: Value,
    },
}

/// Classified output of one `connect` or `query` call.
///
/// Built once by the classifier and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnResult {
    /// How the turn's stream ended.
    pub status: TurnStatus,
    /// Human-facing messages in source order.
    pub user_messages: Vec<UserMessage>,
    /// Context messages in source order.
    pub context_messages: Vec<ContextMessage>,
}

impl TurnResult {
    /// Whether the turn ended with a terminal event.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == TurnStatus::Complete
    }
}
