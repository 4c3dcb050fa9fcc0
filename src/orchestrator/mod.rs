//! Conversation orchestration.
//!
//! Covers the connect / pause / resume control loop, the collaborator
//! traits it calls out to, and rendering of notices and terminal results.

pub mod boundary;
pub mod conversation;
pub mod summary;

pub use boundary::{ArtifactCollector, HumanInput, HumanReply, PausePrompt, ProgressSink};
pub use conversation::{Conversation, ConversationPolicy, ConversationRequest};
