//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
///
/// Idle timeouts and human cancellation are deliberately absent: both are
/// ordinary conversation endings and are modelled as
/// [`EndReason`](crate::models::outcome::EndReason) values.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// Protocol-level failure talking to the agent subprocess mid-turn.
    Transport(String),
    /// `query` issued before a successful `connect`.
    NotConnected(String),
    /// The isolation unit (actor task) hosting the session died.
    ///
    /// This is the only variant the orchestrator retries.
    ActorFailure(String),
    /// No session reservation available for a new actor.
    Capacity(String),
    /// The human-input boundary failed to deliver a reply.
    HumanInput(String),
    /// Output artifact discovery or upload failure.
    Artifact(String),
}

impl AppError {
    /// Whether this error means the hosting actor is gone and a fresh one
    /// must be created.
    #[must_use]
    pub fn is_actor_failure(&self) -> bool {
        matches!(self, Self::ActorFailure(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::NotConnected(msg) => write!(f, "not connected: {msg}"),
            Self::ActorFailure(msg) => write!(f, "actor failure: {msg}"),
            Self::Capacity(msg) => write!(f, "capacity: {msg}"),
            Self::HumanInput(msg) => write!(f, "human input: {msg}"),
            Self::Artifact(msg) => write!(f, "artifact: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
