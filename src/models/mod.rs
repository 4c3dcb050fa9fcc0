//! Domain model module declarations.

pub mod execution;
pub mod outcome;
pub mod turn;

pub use execution::{ContinuationToken, ExecutionId, OrchestratorState, Phase};
pub use outcome::{ConversationOutcome, EndReason};
pub use turn::{ContextMessage, TurnResult, TurnStatus, UserMessage};
