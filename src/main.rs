#![forbid(unsafe_code)]

//! `agent-hitl`: runs one human-in-the-loop conversation with an agent CLI
//! from the terminal.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use agent_hitl::artifacts::FsArtifacts;
use agent_hitl::config::CompletionMode;
use agent_hitl::console::{ConsoleInput, ConsoleProgress};
use agent_hitl::models::execution::ExecutionId;
use agent_hitl::orchestrator::{Conversation, ConversationPolicy, ConversationRequest};
use agent_hitl::session::cli_client::CliClientFactory;
use agent_hitl::session::registry::SessionRegistry;
use agent_hitl::{AppError, GlobalConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-hitl", about = "Human-in-the-loop agent conversation", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the workspace root the agent runs in.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Resume or pin a conversation identity.
    #[arg(long)]
    execution_id: Option<String>,

    /// Override the completion policy (auto-complete or continuous).
    #[arg(long)]
    completion_mode: Option<CompletionMode>,

    /// Initial prompt.
    prompt: String,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(ws) = args.workspace {
        config.workspace_root = ws;
    }
    config.apply_env_overrides();
    if let Some(mode) = args.completion_mode {
        config.conversation.completion_mode = mode;
    }
    config.validate()?;

    let prompt = args.prompt.trim().to_owned();
    if prompt.is_empty() {
        return Err(AppError::Config("prompt must not be empty".into()));
    }
    info!(
        workspace = %config.workspace_root.display(),
        completion_mode = %config.conversation.completion_mode,
        "configuration loaded"
    );

    // ── Build the session stack ─────────────────────────
    let factory = Arc::new(CliClientFactory::new(config.spawn_config()));
    let registry = Arc::new(SessionRegistry::new(factory, config.registry_config()));
    let conversation = Conversation::new(
        Arc::clone(&registry),
        Arc::new(ConsoleInput::new()),
        Arc::new(ConsoleProgress),
        ConversationPolicy::from(&config.conversation),
    )
    .with_artifacts(Arc::new(FsArtifacts::new(
        config.workspace_root.clone(),
        config.output_dir(),
    )));

    let mut request = ConversationRequest::new(prompt);
    if let Some(id) = args.execution_id {
        request = request.with_execution_id(ExecutionId::new(id));
    }

    // ── Run until termination or a shutdown signal ──────
    tokio::select! {
        outcome = conversation.run(request) => {
            println!("{}", outcome.body);
            if outcome.reason.is_failure() {
                warn!(reason = %outcome.reason, "conversation ended on a failure path");
            }
        }
        () = shutdown_signal() => {
            info!("shutdown signal received");
            registry.teardown_all().await;
        }
    }

    info!("agent-hitl shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
