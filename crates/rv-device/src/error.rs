//! Device errors

use thiserror::Error;

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors reported by device collaborators
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Input backend failed: {0}")]
    Backend(String),

    #[error("Input bus closed")]
    BusClosed,

    #[error("Window unavailable: {0}")]
    WindowUnavailable(String),

    #[error("Failed to open window: {0}")]
    OpenFailed(String),

    #[error("Failed to close window: {0}")]
    CloseFailed(String),
}
