// ABOUTME: Error types for rollout control and operator commands.
// ABOUTME: Includes a kind() classifier and helpers for lock failures.

use chrono::{DateTime, Utc};

use super::state::RolloutStatus;
use crate::backend::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum RolloutError {
    /// Command failed validation; nothing changed.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Budgets do not resolve for this replica count.
    #[error("invalid budget: {0}")]
    InvalidBudget(String),

    /// The rollout already reached a terminal state.
    #[error("rollout already {0}")]
    Finished(RolloutStatus),

    /// The controller task is gone.
    #[error("rollout controller is no longer running")]
    Stopped,

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("rollout lock error: {0}")]
    Lock(String),

    /// Another rollout of the same service holds the lock.
    #[error("rollout lock held by {holder} (pid {pid}) since {started_at}")]
    LockHeld {
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutErrorKind {
    InvalidCommand,
    InvalidBudget,
    Finished,
    Stopped,
    Backend,
    Lock,
}

impl RolloutError {
    pub fn kind(&self) -> RolloutErrorKind {
        match self {
            RolloutError::InvalidCommand(_) => RolloutErrorKind::InvalidCommand,
            RolloutError::InvalidBudget(_) => RolloutErrorKind::InvalidBudget,
            RolloutError::Finished(_) => RolloutErrorKind::Finished,
            RolloutError::Stopped => RolloutErrorKind::Stopped,
            RolloutError::Backend(_) => RolloutErrorKind::Backend,
            RolloutError::Lock(_) | RolloutError::LockHeld { .. } => RolloutErrorKind::Lock,
        }
    }

    pub fn lock_error(msg: impl Into<String>) -> Self {
        RolloutError::Lock(msg.into())
    }

    pub fn lock_held(holder: String, pid: u32, started_at: DateTime<Utc>) -> Self {
        RolloutError::LockHeld {
            holder,
            pid,
            started_at,
        }
    }
}
