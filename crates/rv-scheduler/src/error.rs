//! Error types for the scheduler and session runner

use rv_config::ConfigError;
use rv_core::{RoutineName, RoutineNameError};
use thiserror::Error;

/// Errors surfaced to whoever drives sessions
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Unknown routine: {0}")]
    UnknownRoutine(RoutineName),

    #[error("Invalid routine name: {0}")]
    InvalidRoutineName(#[from] RoutineNameError),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Account already running: {0}")]
    AlreadyRunning(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
