//! Execution-ID → actor table.
//!
//! One registry is built at process start and shared by every conversation.
//! It holds only [`ActorHandle`]s; each subprocess client stays inside its
//! actor task. Entries are removed solely by [`SessionRegistry::teardown`].
//!
//! `create` is expected only after `lookup` returned `None`. There is no
//! atomic guard across independent callers: one orchestrator drives each
//! execution ID, so a duplicate create is logged and replaces the entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::models::execution::ExecutionId;
use crate::session::actor::{ActorHandle, SessionActor, DEFAULT_IDLE_TIMEOUT};
use crate::session::client::ClientFactory;
use crate::{AppError, Result};

/// How long teardown waits for a queued disconnect before destroying the
/// actor anyway. A disconnect waits behind any in-flight turn.
pub const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Registry sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Reservations available for live actors.
    pub max_concurrent_sessions: usize,
    /// Idle threshold handed to each new actor.
    pub idle_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 4,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Process-scoped table of live session actors.
pub struct SessionRegistry {
    actors: Mutex<HashMap<ExecutionId, ActorHandle>>,
    factory: Arc<dyn ClientFactory>,
    reservations: Arc<Semaphore>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    /// Create an empty registry whose actors build clients with `factory`.
    #[must_use]
    pub fn new(factory: Arc<dyn ClientFactory>, config: RegistryConfig) -> Self {
        Self {
            actors: Mutex::new(HashMap::new()),
            factory,
            reservations: Arc::new(Semaphore::new(config.max_concurrent_sessions)),
            idle_timeout: config.idle_timeout,
        }
    }

    /// Find the live actor for `id`. Never creates or removes anything.
    pub async fn lookup(&self, id: &ExecutionId) -> Option<ActorHandle> {
        self.actors
            .lock()
            .await
            .get(id)
            .filter(|handle| handle.is_alive())
            .cloned()
    }

    /// Spawn a detached actor for `id` and register it.
    ///
    /// The actor holds one session reservation until it stops. It is never
    /// restarted automatically.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Capacity`] if every reservation is in use.
    pub async fn create(&self, id: &ExecutionId) -> Result<ActorHandle> {
        let reservation = Arc::clone(&self.reservations)
            .try_acquire_owned()
            .map_err(|_| {
                AppError::Capacity(format!(
                    "no session reservation available for {}",
                    id.actor_name()
                ))
            })?;

        let actor = SessionActor::new(id.clone(), Arc::clone(&self.factory), self.idle_timeout);
        let handle = actor.spawn(Some(reservation));

        if let Some(previous) = self.actors.lock().await.insert(id.clone(), handle.clone()) {
            warn!(actor = previous.name(), "replaced existing actor registration");
            previous.destroy();
        }

        info!(actor = handle.name(), "actor created");
        Ok(handle)
    }

    /// Return the live actor for `id`, creating one on a miss.
    ///
    /// The flag is `true` when the actor was created by this call.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Capacity`] if a new actor is needed and no
    /// reservation is available.
    pub async fn lookup_or_create(&self, id: &ExecutionId) -> Result<(ActorHandle, bool)> {
        if let Some(handle) = self.lookup(id).await {
            debug!(actor = handle.name(), "reattached to live actor");
            return Ok((handle, false));
        }
        self.create(id).await.map(|handle| (handle, true))
    }

    /// Disconnect and destroy the actor for `id`.
    ///
    /// Best effort: an absent entry is a no-op. A disconnect that fails or
    /// outlasts [`DISCONNECT_GRACE`] does not prevent destruction, and
    /// nothing is propagated.
    pub async fn teardown(&self, id: &ExecutionId) {
        let Some(handle) = self.actors.lock().await.remove(id) else {
            debug!(execution_id = %id, "teardown: no actor registered");
            return;
        };

        match tokio::time::timeout(DISCONNECT_GRACE, handle.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(actor = handle.name(), %err, "teardown: disconnect failed"),
            Err(_) => warn!(
                actor = handle.name(),
                grace_secs = DISCONNECT_GRACE.as_secs(),
                "teardown: actor busy, destroying without disconnect"
            ),
        }
        handle.destroy();
        info!(actor = handle.name(), "actor torn down");
    }

    /// Tear down every registered actor.
    pub async fn teardown_all(&self) {
        let ids: Vec<ExecutionId> = self.actors.lock().await.keys().cloned().collect();
        for id in &ids {
            self.teardown(id).await;
        }
    }

    /// Number of registered actors.
    pub async fn len(&self) -> usize {
        self.actors.lock().await.len()
    }

    /// Whether no actor is registered.
    pub async fn is_empty(&self) -> bool {
        self.actors.lock().await.is_empty()
    }

    /// Reservations currently free.
    #[must_use]
    pub fn available_reservations(&self) -> usize {
        self.reservations.available_permits()
    }
}
