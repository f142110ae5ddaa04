// ABOUTME: Backend error types with SNAFU pattern.
// ABOUTME: Distinguishes timeouts and outages (retryable) from rejected calls.

use snafu::Snafu;
use std::time::Duration;

/// Failure of a call to the instance lifecycle backend.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BackendError {
    #[snafu(display("{operation} timed out after {}ms", timeout.as_millis()))]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[snafu(display("backend unavailable: {message}"))]
    Unavailable { message: String },

    #[snafu(display("{operation} rejected: {message}"))]
    Rejected {
        operation: &'static str,
        message: String,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    Timeout,
    Unavailable,
    Rejected,
}

impl BackendError {
    pub fn kind(&self) -> BackendErrorKind {
        match self {
            BackendError::Timeout { .. } => BackendErrorKind::Timeout,
            BackendError::Unavailable { .. } => BackendErrorKind::Unavailable,
            BackendError::Rejected { .. } => BackendErrorKind::Rejected,
        }
    }

    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        BackendError::Unavailable {
            message: message.into(),
        }
    }
}
