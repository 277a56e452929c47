use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while capturing and streaming audio.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CaptureError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("device not available")]
    DeviceUnavailable,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("processing failed: {0}")]
    ProcessingError(String),

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("controller destroyed")]
    Destroyed,

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// One error occurrence as delivered to the error observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureErrorReport {
    /// Human-readable description of what was being attempted.
    pub message: String,
    pub cause: CaptureError,
    pub timestamp: DateTime<Utc>,
}

impl CaptureErrorReport {
    pub fn new(message: impl Into<String>, cause: CaptureError) -> Self {
        Self {
            message: message.into(),
            cause,
            timestamp: Utc::now(),
        }
    }
}
