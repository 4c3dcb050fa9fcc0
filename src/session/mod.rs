//! Session hosting: subprocess clients, the actors that own them, and the
//! registry that lets a resumed orchestrator find its actor again.

pub mod actor;
pub mod cli_client;
pub mod client;
pub mod registry;
pub mod spawner;

pub use actor::{ActorHandle, SessionActor, DEFAULT_IDLE_TIMEOUT};
pub use client::{ClientFactory, SubprocessClient};
pub use registry::{RegistryConfig, SessionRegistry};
