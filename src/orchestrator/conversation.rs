//! Conversation orchestrator.
//!
//! Drives one conversation from the first prompt to a terminal result:
//! resolve the actor, connect, then alternate between surfacing a turn at
//! the human-input boundary and querying the actor with the reply. Only
//! [`AppError::ActorFailure`] is retried; every other fault becomes an
//! [`EndReason::Error`]. The actor is torn down exactly once on every path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{CompletionMode, ConversationConfig};
use crate::models::execution::{ExecutionId, OrchestratorState, Phase};
use crate::models::outcome::{ConversationOutcome, EndReason};
use crate::models::turn::{TurnResult, UserMessage};
use crate::orchestrator::boundary::{
    ArtifactCollector, HumanInput, HumanReply, PausePrompt, ProgressSink,
};
use crate::orchestrator::summary::{
    build_conversation_summary, build_final_result, context_notice, excerpt, ERROR_EXCERPT_CHARS,
};
use crate::session::actor::ActorHandle;
use crate::session::registry::SessionRegistry;
use crate::{AppError, Result};

/// Replies that end the conversation, compared case-insensitively.
pub const STOP_KEYWORDS: [&str; 4] = ["done", "exit", "quit", "stop"];

/// Prefix of the prompt sent to a recreated or reattached actor.
pub const RECONNECT_PREFIX: &str = "Continuing conversation: ";

/// Loop limits and completion behaviour for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationPolicy {
    /// Whether a complete turn ends the conversation.
    pub completion_mode: CompletionMode,
    /// Iteration cap.
    pub max_iterations: u32,
    /// Actor failures tolerated before giving up.
    pub max_retries: u32,
    /// Collect and store generated files on auto-completion.
    pub upload_files: bool,
    /// Exclusions handed to the artifact collector.
    pub file_exclusions: Vec<String>,
}

impl Default for ConversationPolicy {
    fn default() -> Self {
        Self::from(&ConversationConfig::default())
    }
}

impl From<&ConversationConfig> for ConversationPolicy {
    fn from(config: &ConversationConfig) -> Self {
        Self {
            completion_mode: config.completion_mode,
            max_iterations: config.max_turns,
            max_retries: config.max_retries,
            upload_files: config.upload_files,
            file_exclusions: config.file_exclusions.clone(),
        }
    }
}

/// Input of [`Conversation::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRequest {
    /// Initial prompt.
    pub prompt: String,
    /// When the conversation was requested.
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied identity; generated when absent.
    pub execution_id: Option<ExecutionId>,
}

impl ConversationRequest {
    /// Request timestamped now, with a generated execution ID.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            timestamp: Utc::now(),
            execution_id: None,
        }
    }

    /// Pin the execution ID, e.g. when resuming a persisted conversation.
    #[must_use]
    pub fn with_execution_id(mut self, execution_id: ExecutionId) -> Self {
        self.execution_id = Some(execution_id);
        self
    }
}

/// How the conversation loop ended, before rendering.
#[derive(Debug)]
enum Ending {
    /// The agent completed the task under auto-complete.
    TaskComplete(Vec<UserMessage>),
    /// Any other ending, with the last user-facing messages seen.
    Summary(EndReason, Vec<UserMessage>),
}

impl Ending {
    fn reason(&self) -> EndReason {
        match self {
            Self::TaskComplete(_) => EndReason::TaskCompleted,
            Self::Summary(reason, _) => reason.clone(),
        }
    }
}

/// Orchestrates conversations against a shared [`SessionRegistry`].
pub struct Conversation {
    registry: Arc<SessionRegistry>,
    human: Arc<dyn HumanInput>,
    progress: Arc<dyn ProgressSink>,
    artifacts: Option<Arc<dyn ArtifactCollector>>,
    policy: ConversationPolicy,
}

impl Conversation {
    /// Create an orchestrator without artifact collection.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        human: Arc<dyn HumanInput>,
        progress: Arc<dyn ProgressSink>,
        policy: ConversationPolicy,
    ) -> Self {
        Self {
            registry,
            human,
            progress,
            artifacts: None,
            policy,
        }
    }

    /// Collect generated files through `artifacts` on auto-completion.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactCollector>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Run one conversation to termination.
    ///
    /// Never fails: every fault is folded into the outcome's reason.
    pub async fn run(&self, request: ConversationRequest) -> ConversationOutcome {
        let execution_id = request
            .execution_id
            .clone()
            .unwrap_or_else(ExecutionId::generate);
        let span = info_span!("conversation", execution_id = %execution_id);
        self.run_inner(execution_id, request).instrument(span).await
    }

    async fn run_inner(
        &self,
        execution_id: ExecutionId,
        request: ConversationRequest,
    ) -> ConversationOutcome {
        let mut state = OrchestratorState::new(execution_id.clone());
        info!("conversation started");
        self.progress.notice(&format!(
            "## Conversation Started\n**Timestamp:** {}\n**Execution ID:** {execution_id}\n",
            request.timestamp.to_rfc3339()
        ));

        let ending = match self.converse(&mut state, &request.prompt).await {
            Ok(ending) => ending,
            Err(err) => {
                warn!(%err, iteration = state.iteration, "conversation failed");
                let message = err.to_string();
                Ending::Summary(
                    EndReason::Error(excerpt(&message, ERROR_EXCERPT_CHARS).to_owned()),
                    Vec::new(),
                )
            }
        };

        enter(&mut state, Phase::Finalizing);
        let reason = ending.reason();
        let ended_at = Utc::now();
        let body = self.render(&ending, state.iteration, ended_at).await;

        self.registry.teardown(&execution_id).await;
        enter(&mut state, Phase::Terminated);
        info!(
            reason = %reason,
            iterations = state.iteration,
            retry_count = state.retry_count,
            "conversation terminated"
        );

        ConversationOutcome {
            execution_id,
            reason,
            iterations: state.iteration,
            retry_count: state.retry_count,
            ended_at,
            body,
        }
    }

    /// Retry loop around [`Self::attempt`].
    async fn converse(&self, state: &mut OrchestratorState, prompt: &str) -> Result<Ending> {
        loop {
            match self.attempt(state, prompt).await {
                Err(err) if err.is_actor_failure() => {
                    state.retry_count += 1;
                    if state.retry_count > self.policy.max_retries {
                        warn!(%err, retry_count = state.retry_count, "actor failed, retries exhausted");
                        return Ok(Ending::Summary(EndReason::FailedAfterRetries, Vec::new()));
                    }
                    warn!(%err, retry_count = state.retry_count, "actor failed, retrying");
                    self.progress.notice(&format!(
                        "**Session crashed. Retrying ({}/{})...**",
                        state.retry_count, self.policy.max_retries
                    ));
                    self.registry.teardown(&state.execution_id).await;
                }
                other => return other,
            }
        }
    }

    /// One connect attempt followed by the turn loop.
    async fn attempt(&self, state: &mut OrchestratorState, prompt: &str) -> Result<Ending> {
        enter(state, Phase::Initializing);
        let (actor, created) = self.registry.lookup_or_create(&state.execution_id).await?;

        let opening = if created && state.retry_count == 0 {
            self.progress.notice("Connecting to agent...");
            prompt.to_owned()
        } else {
            self.progress.notice("Reconnecting to agent...");
            format!("{RECONNECT_PREFIX}{prompt}")
        };

        enter(state, Phase::AwaitingActorResponse);
        let turn = actor.connect(&opening).await?;
        self.progress.notice("Connected");

        self.turn_loop(state, &actor, turn).await
    }

    async fn turn_loop(
        &self,
        state: &mut OrchestratorState,
        actor: &ActorHandle,
        mut turn: TurnResult,
    ) -> Result<Ending> {
        loop {
            if state.iteration >= self.policy.max_iterations {
                return Ok(Ending::Summary(
                    EndReason::MaxIterations(self.policy.max_iterations),
                    turn.user_messages,
                ));
            }
            state.iteration += 1;
            debug!(iteration = state.iteration, status = turn.status.as_str(), "turn received");

            if turn.is_complete() && self.policy.completion_mode == CompletionMode::AutoComplete {
                return Ok(Ending::TaskComplete(turn.user_messages));
            }

            for message in &turn.context_messages {
                self.progress.notice(&context_notice(message));
            }

            enter(state, Phase::AwaitingHumanInput);
            let reply = self
                .human
                .request_input(PausePrompt {
                    token: state.continuation_token(),
                    iteration: state.iteration,
                    messages: turn.user_messages.clone(),
                    status: turn.status,
                })
                .await?;

            let Some(HumanReply { response, .. }) = reply.filter(|reply| !reply.cancelled) else {
                return Ok(Ending::Summary(EndReason::EndedByUser, turn.user_messages));
            };

            let response = response.trim();
            if STOP_KEYWORDS
                .iter()
                .any(|keyword| response.eq_ignore_ascii_case(keyword))
            {
                return Ok(Ending::Summary(EndReason::Completed, turn.user_messages));
            }
            if response.is_empty() {
                return Ok(Ending::Summary(EndReason::EmptyResponse, turn.user_messages));
            }

            if actor.check_timeout().await? {
                info!(iteration = state.iteration, "session idle past threshold");
                return Ok(Ending::Summary(EndReason::TimedOut, turn.user_messages));
            }

            self.progress.notice(&format!("**You:** {response}"));
            enter(state, Phase::AwaitingActorResponse);
            turn = actor.query(response).await?;
        }
    }

    async fn render(&self, ending: &Ending, iterations: u32, ended_at: DateTime<Utc>) -> String {
        match ending {
            Ending::TaskComplete(messages) => {
                let files = self.upload_artifacts().await;
                build_final_result(
                    messages,
                    &files,
                    &EndReason::TaskCompleted,
                    iterations,
                    ended_at,
                )
            }
            Ending::Summary(reason, messages) => {
                build_conversation_summary(reason, iterations, messages, ended_at)
            }
        }
    }

    /// Collect and store generated files; failures only produce notices.
    async fn upload_artifacts(&self) -> Vec<String> {
        let Some(artifacts) = self.artifacts.as_ref().filter(|_| self.policy.upload_files) else {
            return Vec::new();
        };

        let outcome: Result<Vec<String>> = async {
            let paths = artifacts.collect(&self.policy.file_exclusions).await?;
            if paths.is_empty() {
                debug!("no generated files to upload");
                return Ok(Vec::new());
            }
            artifacts.upload(&paths, self.progress.as_ref()).await
        }
        .await;

        outcome.unwrap_or_else(|err: AppError| {
            warn!(%err, "artifact upload failed");
            self.progress.notice(&format!("File upload failed: {err}"));
            Vec::new()
        })
    }
}

fn enter(state: &mut OrchestratorState, phase: Phase) {
    if state.phase != phase {
        debug!(from = ?state.phase, to = ?phase, iteration = state.iteration, "phase transition");
        state.phase = phase;
    }
}
