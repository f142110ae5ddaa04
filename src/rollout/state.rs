// ABOUTME: Rollout status machine and the per-rollout state record.
// ABOUTME: Progressing <-> Paused, then exactly one of Succeeded or Aborted.

use serde::Serialize;

use crate::types::RevisionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutStatus {
    Progressing,
    Paused,
    Succeeded,
    Aborted,
}

impl RolloutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RolloutStatus::Succeeded | RolloutStatus::Aborted)
    }
}

impl std::fmt::Display for RolloutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RolloutStatus::Progressing => write!(f, "progressing"),
            RolloutStatus::Paused => write!(f, "paused"),
            RolloutStatus::Succeeded => write!(f, "succeeded"),
            RolloutStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Why a rollout was rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortReason {
    /// Too many new instances went unhealthy within the observation window.
    ErrorRate,
    /// The progress deadline passed before the rollout succeeded.
    Timeout,
    /// An operator cancelled the rollout.
    Manual,
    /// Backend calls kept failing past the retry budget.
    BackendError,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::ErrorRate => write!(f, "error-rate"),
            AbortReason::Timeout => write!(f, "timeout"),
            AbortReason::Manual => write!(f, "manual"),
            AbortReason::BackendError => write!(f, "backend-error"),
        }
    }
}

/// The transition between a baseline and a target revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloutState {
    /// None on a first rollout, when nothing was running yet.
    pub old_revision: Option<RevisionId>,
    pub new_revision: RevisionId,
    pub surge: u32,
    pub unavailable: u32,
    /// Old instances removed after their replacement became healthy.
    pub updated: u32,
    pub status: RolloutStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
}

impl RolloutState {
    pub fn new(
        old_revision: Option<RevisionId>,
        new_revision: RevisionId,
        surge: u32,
        unavailable: u32,
    ) -> Self {
        Self {
            old_revision,
            new_revision,
            surge,
            unavailable,
            updated: 0,
            status: RolloutStatus::Progressing,
            abort_reason: None,
        }
    }
}
