// ABOUTME: Health probing: probe targets, the periodic scheduler, and the evaluator.
// ABOUTME: Probe results are polled by the rollout controller, never pushed into it.

mod evaluator;
mod http;
mod scheduler;
mod scripted;

pub use evaluator::{HealthChange, HealthEvaluator, HealthState, InstanceHealth};
pub use http::HttpProbe;
pub use scheduler::ProbeScheduler;
pub use scripted::ScriptedProbe;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ProbeConfig;
use crate::types::{Instance, InstanceId};

/// Which of the two checks a probe performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Is the process alive? Failing past the threshold means replace it.
    Liveness,
    /// Should it receive traffic? Failing takes it out of the serving set.
    Readiness,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeKind::Liveness => write!(f, "liveness"),
            ProbeKind::Readiness => write!(f, "readiness"),
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    /// Timeout or connection error.
    Transient(String),
    /// The target answered with a non-success status.
    Failure(String),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success)
    }
}

/// One check result, as queued for the controller.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub instance: InstanceId,
    pub kind: ProbeKind,
    pub outcome: ProbeOutcome,
}

/// Something that can answer liveness and readiness checks for an instance.
#[async_trait]
pub trait ProbeTarget: Send + Sync {
    async fn check(&self, instance: &Instance, kind: ProbeKind, config: &ProbeConfig)
    -> ProbeOutcome;
}
