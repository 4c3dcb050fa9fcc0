//! Seam between a session actor and the agent subprocess it owns.
//!
//! The [`SubprocessClient`] trait keeps the actor independent of how the
//! agent is reached. [`CliClient`](crate::session::cli_client::CliClient)
//! drives a real agent CLI over stdio; tests substitute scripted clients.

use std::future::Future;
use std::pin::Pin;

use crate::models::execution::ExecutionId;
use crate::stream::event::StreamEvent;
use crate::Result;

/// Boxed future returned by [`SubprocessClient`] methods.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Bidirectional channel to one agent subprocess.
///
/// Exactly one actor owns a client at a time; methods take `&mut self` and
/// are never called concurrently.
pub trait SubprocessClient: Send {
    /// Start the subprocess and open its channel without sending a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// subprocess cannot be started.
    fn open(&mut self) -> ClientFuture<'_, Result<()>>;

    /// Send one user message.
    ///
    /// Any events still buffered from the previous turn are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// channel is not open or the write fails.
    fn send(&mut self, message: &str) -> ClientFuture<'_, Result<()>>;

    /// Next event of the current turn; `None` once the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) on
    /// framing or read failures.
    fn next_event(&mut self) -> ClientFuture<'_, Result<Option<StreamEvent>>>;

    /// Release the subprocess. Calling on a closed client is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// subprocess could not be stopped cleanly.
    fn close(&mut self) -> ClientFuture<'_, Result<()>>;
}

/// Builds a fresh, unopened client for a conversation.
pub trait ClientFactory: Send + Sync {
    /// Create a client for `execution_id`.
    fn create(&self, execution_id: &ExecutionId) -> Box<dyn SubprocessClient>;
}
