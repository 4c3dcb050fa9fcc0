//! Persistent session actor.
//!
//! A [`SessionActor`] exclusively owns the subprocess client for one
//! conversation. [`SessionActor::spawn`] moves it onto a detached tokio task
//! and returns a cloneable [`ActorHandle`]; every call is a message on the
//! task's queue, so commands run strictly one at a time.
//!
//! The task outlives whoever spawned it. It stops when
//! [`ActorHandle::destroy`] is called or every handle has been dropped.
//! If the task dies for any reason, pending and future calls fail with
//! [`AppError::ActorFailure`], which is distinct from the transport errors
//! the actor reports while alive.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::models::execution::ExecutionId;
use crate::models::turn::TurnResult;
use crate::session::client::{ClientFactory, SubprocessClient};
use crate::stream::classifier::TurnBuilder;
use crate::{AppError, Result};

/// Idle threshold after which [`SessionActor::check_timeout`] reports true:
/// ten minutes of conversation plus a one-minute buffer.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(660);

/// Depth of the actor's command queue.
const COMMAND_QUEUE: usize = 8;

/// Session state owned by one actor.
pub struct SessionActor {
    name: String,
    execution_id: ExecutionId,
    factory: Arc<dyn ClientFactory>,
    client: Option<Box<dyn SubprocessClient>>,
    connected: bool,
    last_activity: Instant,
    idle_timeout: Duration,
}

impl SessionActor {
    /// Create a disconnected actor. No subprocess is started yet.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        factory: Arc<dyn ClientFactory>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            name: execution_id.actor_name(),
            execution_id,
            factory,
            client: None,
            connected: false,
            last_activity: Instant::now(),
            idle_timeout,
        }
    }

    /// Actor name derived from the execution ID.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a subprocess client is currently held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Start a new subprocess session and collect its first turn.
    ///
    /// The channel is opened first and the prompt written as a separate
    /// step. An existing connection is disconnected beforehand so the old
    /// subprocess is never orphaned. On failure the new client is closed and
    /// the actor stays disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if opening, sending, or reading fails.
    pub async fn connect(&mut self, prompt: &str) -> Result<TurnResult> {
        if self.connected {
            warn!(actor = %self.name, "connect on a connected actor, replacing session");
            self.disconnect().await;
        }

        let mut client = self.factory.create(&self.execution_id);
        client.open().await?;

        let first_turn = async {
            client.send(prompt).await?;
            self.touch();
            let turn = collect_turn(client.as_mut()).await?;
            self.touch();
            Ok::<_, AppError>(turn)
        }
        .await;

        match first_turn {
            Ok(turn) => {
                self.client = Some(client);
                self.connected = true;
                info!(actor = %self.name, status = turn.status.as_str(), "session connected");
                Ok(turn)
            }
            Err(err) => {
                if let Err(close_err) = client.close().await {
                    warn!(actor = %self.name, %close_err, "failed to close client after connect error");
                }
                Err(err)
            }
        }
    }

    /// Send a follow-up message and collect the next turn.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotConnected`] if [`connect`](Self::connect) has not
    ///   succeeded or the actor was disconnected since.
    /// - [`AppError::Transport`] if sending or reading fails.
    pub async fn query(&mut self, message: &str) -> Result<TurnResult> {
        let client = match self.client.as_mut() {
            Some(client) if self.connected => client,
            _ => {
                return Err(AppError::NotConnected(format!(
                    "{}: call connect first",
                    self.name
                )));
            }
        };

        self.last_activity = Instant::now();
        client.send(message).await?;
        let turn = collect_turn(client.as_mut()).await?;
        self.touch();
        Ok(turn)
    }

    /// Whether the actor has been idle longer than its threshold.
    ///
    /// Idle time runs from the end of the last turn read by `connect` or
    /// `query`.
    #[must_use]
    pub fn check_timeout(&self) -> bool {
        self.last_activity.elapsed() > self.idle_timeout
    }

    /// Release the subprocess client. Idempotent; never fails.
    pub async fn disconnect(&mut self) {
        if let Some(mut client) = self.client.take() {
            if let Err(err) = client.close().await {
                warn!(actor = %self.name, %err, "disconnect error");
            }
            debug!(actor = %self.name, "session disconnected");
        }
        self.connected = false;
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Move the actor onto a detached task.
    ///
    /// `reservation` is held for the task's whole life and released when it
    /// stops.
    #[must_use]
    pub fn spawn(self, reservation: Option<OwnedSemaphorePermit>) -> ActorHandle {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let cancel = CancellationToken::new();
        let name: Arc<str> = Arc::from(self.name.as_str());
        let span = info_span!("session_actor", actor = %name);

        let task = tokio::spawn(self.run(rx, cancel.clone(), reservation).instrument(span));

        ActorHandle {
            name,
            tx,
            cancel,
            abort: Arc::new(task.abort_handle()),
        }
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Command>,
        cancel: CancellationToken,
        _reservation: Option<OwnedSemaphorePermit>,
    ) {
        debug!("actor started");
        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("actor cancelled");
                    break;
                }

                command = rx.recv() => match command {
                    Some(command) => self.dispatch(command).await,
                    None => {
                        debug!("all actor handles dropped");
                        break;
                    }
                }
            }
        }
        self.disconnect().await;
        debug!("actor stopped");
    }

    async fn dispatch(&mut self, command: Command) {
        match command {
            Command::Connect { prompt, reply } => {
                let _ = reply.send(self.connect(&prompt).await);
            }
            Command::Query { message, reply } => {
                let _ = reply.send(self.query(&message).await);
            }
            Command::CheckTimeout { reply } => {
                let _ = reply.send(self.check_timeout());
            }
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(());
            }
        }
    }
}

/// Drain one turn from `client` through the classifier.
async fn collect_turn<C>(client: &mut C) -> Result<TurnResult>
where
    C: SubprocessClient + ?Sized,
{
    let mut turn = TurnBuilder::new();
    while let Some(event) = client.next_event().await? {
        if turn.absorb(event).is_break() {
            break;
        }
    }
    Ok(turn.finish())
}

enum Command {
    Connect {
        prompt: String,
        reply: oneshot::Sender<Result<TurnResult>>,
    },
    Query {
        message: String,
        reply: oneshot::Sender<Result<TurnResult>>,
    },
    CheckTimeout {
        reply: oneshot::Sender<bool>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

/// Address of a running [`SessionActor`].
///
/// Cheap to clone; holds no subprocess state itself.
#[derive(Debug, Clone)]
pub struct ActorHandle {
    name: Arc<str>,
    tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
    abort: Arc<AbortHandle>,
}

impl ActorHandle {
    /// Name of the actor behind this handle.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the actor task is still accepting commands.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// See [`SessionActor::connect`].
    ///
    /// # Errors
    ///
    /// [`AppError::ActorFailure`] if the actor is gone, otherwise whatever
    /// the actor's `connect` returned.
    pub async fn connect(&self, prompt: &str) -> Result<TurnResult> {
        let prompt = prompt.to_owned();
        self.request(|reply| Command::Connect { prompt, reply }).await?
    }

    /// See [`SessionActor::query`].
    ///
    /// # Errors
    ///
    /// [`AppError::ActorFailure`] if the actor is gone, otherwise whatever
    /// the actor's `query` returned.
    pub async fn query(&self, message: &str) -> Result<TurnResult> {
        let message = message.to_owned();
        self.request(|reply| Command::Query { message, reply }).await?
    }

    /// See [`SessionActor::check_timeout`].
    ///
    /// # Errors
    ///
    /// [`AppError::ActorFailure`] if the actor is gone.
    pub async fn check_timeout(&self) -> Result<bool> {
        self.request(|reply| Command::CheckTimeout { reply }).await
    }

    /// See [`SessionActor::disconnect`].
    ///
    /// # Errors
    ///
    /// [`AppError::ActorFailure`] if the actor is gone.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Stop the actor task immediately. Dropping the task drops the client,
    /// which kills its subprocess. Safe to call repeatedly.
    pub fn destroy(&self) {
        self.cancel.cancel();
        self.abort.abort();
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| self.gone("command queue closed"))?;
        rx.await.map_err(|_| self.gone("actor dropped the reply"))
    }

    fn gone(&self, detail: &str) -> AppError {
        AppError::ActorFailure(format!("{}: {detail}", self.name))
    }
}
