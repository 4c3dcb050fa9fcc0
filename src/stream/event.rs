//! Agent CLI output events.
//!
//! The agent CLI runs with `--output-format stream-json` and writes one JSON
//! object per line. [`parse_line`] turns a line into zero or more
//! [`StreamEvent`]s; an assistant message carrying several content blocks
//! yields one event per block.
//!
//! # Known line types
//!
//! | `type`      | Maps to                                              |
//! |-------------|------------------------------------------------------|
//! | `assistant` | one event per content block                          |
//! | `user`      | [`StreamEvent::ToolResult`] per `tool_result` block  |
//! | `system`    | [`StreamEvent::System`]                              |
//! | `result`    | [`StreamEvent::Result`]                              |
//! | *(other)*   | [`StreamEvent::System`] with `unrecognized:<type>`   |

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{AppError, Result};

/// Subtype prefix for lines or blocks the parser has no dedicated variant for.
pub const UNRECOGNIZED_PREFIX: &str = "unrecognized:";

/// One event from the agent subprocess, in stream order.
///
/// Closed on purpose: the classifier matches exhaustively, so a new kind
/// has to be routed explicitly before it compiles.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Plain assistant text.
    Text {
        /// Text body.
        text: String,
    },
    /// Reasoning trace.
    Thinking {
        /// Reasoning text.
        thinking: String,
        /// Opaque model signature.
        signature: String,
    },
    /// Tool invocation request.
    ToolUse {
        /// Tool call identifier.
        id: String,
        /// Tool name.
        name: String,
        /// Tool arguments.
        input: Value,
    },
    /// Tool invocation result.
    ToolResult {
        /// Identifier of the originating call.
        tool_use_id: String,
        /// Result payload.
        content: Value,
        /// Whether the tool failed.
        is_error: bool,
    },
    /// System or diagnostic event.
    System {
        /// Event subtype.
        subtype: String,
        /// Full raw payload.
        data: Value,
    },
    /// Terminal event closing the turn.
    Result {
        /// Result subtype (`success`, `error_max_turns`, …).
        subtype: String,
        /// Whether the agent reported the turn as failed.
        is_error: bool,
        /// Final text, when present.
        result: Option<String>,
    },
}

impl StreamEvent {
    /// Whether this event ends the turn.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. })
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessageEnvelope {
    message: MessageBody,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    content: MessageContent,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Plain(String),
    Blocks(Vec<Value>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: Option<bool>,
    },
}

const KNOWN_BLOCKS: &[&str] = &["text", "thinking", "tool_use", "tool_result"];

#[derive(Debug, Deserialize)]
struct ResultLine {
    #[serde(default)]
    subtype: String,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    result: Option<String>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse a single NDJSON line from the agent CLI.
///
/// Empty or whitespace-only lines yield no events.
///
/// # Errors
///
/// - [`AppError::Transport`]`("malformed json: …")` if the line is not JSON
///   or has no string `type` field.
/// - [`AppError::Transport`]`("missing required field: …")` if a known line
///   or block type lacks a required field.
pub fn parse_line(line: &str) -> Result<Vec<StreamEvent>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| AppError::Transport(format!("malformed json: {e}")))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Transport("malformed json: missing `type` field".into()))?
        .to_owned();

    match kind.as_str() {
        "assistant" => parse_assistant(value),
        "user" => parse_user(value),
        "system" => Ok(vec![parse_system(value)]),
        "result" => parse_result(value),
        other => {
            debug!(line_type = other, "stream: unrecognized line type");
            Ok(vec![unrecognized(other, value)])
        }
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn parse_assistant(value: Value) -> Result<Vec<StreamEvent>> {
    match message_content(value, "assistant")? {
        MessageContent::Plain(text) => Ok(vec![StreamEvent::Text { text }]),
        MessageContent::Blocks(blocks) => blocks.into_iter().map(parse_block).collect(),
    }
}

/// User lines echo the agent's own tool results back; plain user text is the
/// prompt we sent and is dropped.
fn parse_user(value: Value) -> Result<Vec<StreamEvent>> {
    let MessageContent::Blocks(blocks) = message_content(value, "user")? else {
        return Ok(Vec::new());
    };

    let mut events = Vec::new();
    for block in blocks {
        if block.get("type").and_then(Value::as_str) == Some("text") {
            continue;
        }
        events.push(parse_block(block)?);
    }
    Ok(events)
}

fn parse_system(value: Value) -> StreamEvent {
    let subtype = value
        .get("subtype")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_owned();
    StreamEvent::System {
        subtype,
        data: value,
    }
}

fn parse_result(value: Value) -> Result<Vec<StreamEvent>> {
    let line: ResultLine = serde_json::from_value(value)
        .map_err(|e| AppError::Transport(format!("missing required field: result line: {e}")))?;
    Ok(vec![StreamEvent::Result {
        subtype: line.subtype,
        is_error: line.is_error,
        result: line.result,
    }])
}

fn message_content(value: Value, kind: &str) -> Result<MessageContent> {
    let envelope: MessageEnvelope = serde_json::from_value(value).map_err(|e| {
        AppError::Transport(format!("missing required field: {kind} message: {e}"))
    })?;
    Ok(envelope.message.content)
}

fn parse_block(block: Value) -> Result<StreamEvent> {
    let kind = block
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    if !KNOWN_BLOCKS.contains(&kind.as_str()) {
        debug!(block_type = %kind, "stream: unrecognized content block");
        return Ok(unrecognized(&kind, block));
    }

    let parsed: ContentBlock = serde_json::from_value(block).map_err(|e| {
        AppError::Transport(format!("missing required field: {kind} block: {e}"))
    })?;

    Ok(match parsed {
        ContentBlock::Text { text } => StreamEvent::Text { text },
        ContentBlock::Thinking {
            thinking,
            signature,
        } => StreamEvent::Thinking {
            thinking,
            signature,
        },
        ContentBlock::ToolUse { id, name, input } => StreamEvent::ToolUse { id, name, input },
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => StreamEvent::ToolResult {
            tool_use_id,
            content,
            is_error: is_error.unwrap_or(false),
        },
    })
}

fn unrecognized(kind: &str, data: Value) -> StreamEvent {
    StreamEvent::System {
        subtype: format!("{UNRECOGNIZED_PREFIX}{kind}"),
        data,
    }
}
