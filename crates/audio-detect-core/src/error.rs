use std::time::Duration;

use thiserror::Error;

/// Failure reported by the platform enumeration primitive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PlatformError {
    pub message: String,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    #[error("Device enumeration timed out after {0:?}")]
    Timeout(Duration),

    #[error("Device identity looks unstable: {name} ({previous_id} -> {current_id})")]
    IdentityInstability {
        name: String,
        previous_id: String,
        current_id: String,
    },

    #[error("Invalid monitor configuration: {0}")]
    InvalidConfig(String),

    #[error("No tokio runtime available to drive the monitor")]
    NoRuntime,

    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),
}

impl DetectError {
    /// Whether a monitor tick failed with this error (as opposed to a
    /// diagnostic raised after a successful tick).
    pub fn is_tick_failure(&self) -> bool {
        matches!(self, Self::Enumeration(_) | Self::Timeout(_))
    }
}

impl From<PlatformError> for DetectError {
    fn from(err: PlatformError) -> Self {
        Self::Enumeration(err.message)
    }
}

pub type Result<T> = std::result::Result<T, DetectError>;
