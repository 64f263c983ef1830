//! Error types for routine execution

use rv_config::ConfigError;
use rv_core::RoutineName;
use rv_device::DeviceError;
use thiserror::Error;

/// Error produced by a single step
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("No window manager configured")]
    NoWindowManager,

    #[error("{0}")]
    Failed(String),

    /// The session was asked to stop while the step was suspended.
    /// Never reported; it unwinds the session like `Terminate`.
    #[error("Interrupted by stop request")]
    Interrupted,
}

impl StepError {
    /// Create a generic step failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<ConfigError> for StepError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Routine registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Routine already registered: {0}")]
    Duplicate(RoutineName),

    #[error("Routine {routine} references unknown routine {target}")]
    UnknownTarget {
        routine: RoutineName,
        target: RoutineName,
    },
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
