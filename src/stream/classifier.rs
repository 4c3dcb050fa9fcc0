//! Two-channel classification of a turn's event stream.
//!
//! Text goes to the human-facing channel; everything else except the
//! terminal event goes to the context channel. A terminal event stops
//! classification immediately and marks the turn `Complete`; running out
//! of events leaves it `Ready`.

use std::ops::ControlFlow;

use crate::models::turn::{ContextMessage, TurnResult, TurnStatus, UserMessage};
use crate::stream::event::StreamEvent;

/// Incremental classifier for one turn.
///
/// Feed events with [`absorb`](Self::absorb) until it returns
/// [`ControlFlow::Break`], then call [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct TurnBuilder {
    complete: bool,
    user_messages: Vec<UserMessage>,
    context_messages: Vec<ContextMessage>,
}

impl TurnBuilder {
    /// Start an empty turn.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one event into its channel.
    ///
    /// Returns `Break` once a terminal event has been seen; events absorbed
    /// after that are ignored.
    pub fn absorb(&mut self, event: StreamEvent) -> ControlFlow<()> {
        if self.complete {
            return ControlFlow::Break(());
        }

        match event {
            StreamEvent::Text { text } => {
                self.user_messages.push(UserMessage::text(text));
            }
            StreamEvent::Thinking {
                thinking,
                signature,
            } => self.context_messages.push(ContextMessage::Thinking {
                content: thinking,
                signature,
            }),
            StreamEvent::ToolUse { id, name, input } => {
                self.context_messages
                    .push(ContextMessage::ToolUse { name, id, input });
            }
            StreamEvent::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => self.context_messages.push(ContextMessage::ToolResult {
                tool_use_id,
                content,
                is_error,
            }),
            StreamEvent::System { subtype, data } => {
                self.context_messages
                    .push(ContextMessage::System { subtype, data });
            }
            StreamEvent::Result { .. } => {
                self.complete = true;
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    /// Seal the turn.
    #[must_use]
    pub fn finish(self) -> TurnResult {
        TurnResult {
            status: if self.complete {
                TurnStatus::Complete
            } else {
                TurnStatus::Ready
            },
            user_messages: self.user_messages,
            context_messages: self.context_messages,
        }
    }
}

/// Classify an ordered event sequence.
///
/// Stops pulling from `events` at the first terminal event.
#[must_use]
pub fn classify<I>(events: I) -> TurnResult
where
    I: IntoIterator<Item = StreamEvent>,
{
    let mut builder = TurnBuilder::new();
    for event in events {
        if builder.absorb(event).is_break() {
            break;
        }
    }
    builder.finish()
}
