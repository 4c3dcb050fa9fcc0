//! Markdown rendering for progress notices and terminal results.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::outcome::EndReason;
use crate::models::turn::{ContextMessage, UserMessage};

/// Marker the agent may append when it considers the task done.
pub const TASK_COMPLETE_MARKER: &str = "[TASK_COMPLETE]";

/// Characters of an error message kept in a terminal summary.
pub const ERROR_EXCERPT_CHARS: usize = 100;

const THINKING_PREVIEW: usize = 500;
const TOOL_INPUT_PREVIEW: usize = 200;
const TOOL_RESULT_PREVIEW: usize = 300;
const SYSTEM_PREVIEW: usize = 200;
const SUMMARY_MESSAGE_PREVIEW: usize = 500;
const SUMMARY_MESSAGE_COUNT: usize = 3;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Truncation ──────────────────────────────────────────────────────────

/// First `max` characters of `text`, never splitting a code point.
#[must_use]
pub fn excerpt(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Like [`excerpt`], with `...` appended when anything was cut.
#[must_use]
pub fn preview(text: &str, max: usize) -> String {
    let cut = excerpt(text, max);
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        cut.to_owned()
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Progress notices ────────────────────────────────────────────────────

/// Render one context message as a progress notice.
#[must_use]
pub fn context_notice(message: &ContextMessage) -> String {
    match message {
        ContextMessage::Thinking { content, .. } => {
            format!(
                "**Thinking:**\n\n```\n{}\n```\n",
                preview(content, THINKING_PREVIEW)
            )
        }
        ContextMessage::ToolUse { name, input, .. } => {
            let input = input.to_string();
            format!(
                "**Using tool: {name}**\n\n```json\n{}\n```\n",
                excerpt(&input, TOOL_INPUT_PREVIEW)
            )
        }
        ContextMessage::ToolResult {
            content, is_error, ..
        } => {
            let status = if *is_error { "Error" } else { "Success" };
            format!(
                "**Tool result ({status}):**\n\n```\n{}\n```\n",
                preview(&value_text(content), TOOL_RESULT_PREVIEW)
            )
        }
        ContextMessage::System { subtype, data } => {
            let data = data.to_string();
            format!(
                "**System ({subtype}):** {}\n",
                excerpt(&data, SYSTEM_PREVIEW)
            )
        }
    }
}

// ── Terminal results ────────────────────────────────────────────────────

/// Summary for every ending other than an auto-completed task.
///
/// Includes the last few user-facing messages when any are given.
#[must_use]
pub fn build_conversation_summary(
    reason: &EndReason,
    iterations: u32,
    messages: &[UserMessage],
    ended_at: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        "# Conversation Ended".to_owned(),
        String::new(),
        format!("**Reason:** {reason}"),
        format!("**Turns completed:** {iterations}"),
        String::new(),
    ];

    let shown: Vec<&str> = messages
        .iter()
        .skip(messages.len().saturating_sub(SUMMARY_MESSAGE_COUNT))
        .map(UserMessage::content)
        .filter(|content| !content.is_empty())
        .collect();

    if !shown.is_empty() {
        lines.push("## Last Messages".to_owned());
        lines.push(String::new());
        for content in shown {
            lines.push(format!("> {}", preview(content, SUMMARY_MESSAGE_PREVIEW)));
            lines.push(String::new());
        }
    }

    lines.push("---".to_owned());
    lines.push(format!("**Timestamp:** {}", ended_at.format(TIMESTAMP_FORMAT)));
    lines.join("\n")
}

/// Result for a conversation the agent itself completed.
///
/// The completion marker is stripped from each message; messages left empty
/// are dropped. `files` become download links under `/out/`.
#[must_use]
pub fn build_final_result(
    messages: &[UserMessage],
    files: &[String],
    reason: &EndReason,
    iterations: u32,
    ended_at: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        "# Task Completed".to_owned(),
        String::new(),
        "## Result".to_owned(),
        String::new(),
    ];

    for message in messages {
        let stripped = message.content().replace(TASK_COMPLETE_MARKER, "");
        let stripped = stripped.trim();
        if !stripped.is_empty() {
            lines.push(stripped.to_owned());
            lines.push(String::new());
        }
    }

    if !files.is_empty() {
        lines.push("## Generated Files".to_owned());
        lines.push(String::new());
        for name in files {
            lines.push(format!("- [{name}](/out/{name})"));
        }
        lines.push(String::new());
    }

    lines.push("---".to_owned());
    lines.push(String::new());
    lines.push(format!("**Status:** {reason}"));
    lines.push(format!("**Conversation turns:** {iterations}"));
    lines.push(format!("**Completed:** {}", ended_at.format(TIMESTAMP_FORMAT)));
    lines.join("\n")
}
