#![forbid(unsafe_code)]

//! Human-in-the-loop conversations with a persistent agent CLI session.

pub mod artifacts;
pub mod config;
pub mod console;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod session;
pub mod stream;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
