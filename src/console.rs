//! Terminal implementations of the human-input and progress boundaries.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;

use crate::models::turn::TurnStatus;
use crate::orchestrator::boundary::{
    BoundaryFuture, HumanInput, HumanReply, PausePrompt, ProgressSink,
};
use crate::{AppError, Result};

/// Reads one reply per pause from stdin. End of input means no reply.
pub struct ConsoleInput {
    lines: Mutex<tokio::io::Lines<BufReader<Stdin>>>,
}

impl ConsoleInput {
    /// Attach to the process stdin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}

/// Markdown shown to the human at a pause.
#[must_use]
pub fn render_pause(prompt: &PausePrompt) -> String {
    let mut out = format!("\n## Agent response (turn {})\n\n", prompt.iteration);
    for message in &prompt.messages {
        out.push_str(message.content());
        out.push_str("\n\n");
    }
    if prompt.status == TurnStatus::Complete {
        out.push_str("*The agent has finished responding. Continue, or type 'done' to end.*\n\n");
    }
    out.push_str("---\nType your response, or 'done' to end the conversation.\n> ");
    out
}

fn show(prompt: &PausePrompt) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(render_pause(prompt).as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|err| AppError::HumanInput(format!("cannot write prompt: {err}")))
}

impl HumanInput for ConsoleInput {
    fn request_input(&self, prompt: PausePrompt) -> BoundaryFuture<'_, Result<Option<HumanReply>>> {
        Box::pin(async move {
            show(&prompt)?;

            let line = self
                .lines
                .lock()
                .await
                .next_line()
                .await
                .map_err(|err| AppError::HumanInput(format!("cannot read reply: {err}")))?;
            Ok(line.map(HumanReply::text))
        })
    }
}

/// Writes progress notices to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn notice(&self, text: &str) {
        eprintln!("{text}");
    }
}
