// ABOUTME: Turns a stream of probe outcomes into per-instance health state.
// ABOUTME: Consecutive-failure thresholds per probe kind; any success resets the counter.

use serde::Serialize;

use super::{ProbeKind, ProbeOutcome};
use crate::config::ProbesConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Unknown => write!(f, "unknown"),
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health bookkeeping for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHealth {
    pub state: HealthState,
    /// In the serving set.
    pub ready: bool,
    pub liveness_failures: u32,
    pub readiness_failures: u32,
    /// Liveness failed past its threshold. Sticky.
    pub needs_replacement: bool,
    /// Reported Healthy at least once.
    pub ever_healthy: bool,
}

impl InstanceHealth {
    /// A freshly created instance: nothing known yet.
    pub fn unknown() -> Self {
        Self {
            state: HealthState::Unknown,
            ready: false,
            liveness_failures: 0,
            readiness_failures: 0,
            needs_replacement: false,
            ever_healthy: false,
        }
    }

    /// An instance that was already serving when the rollout started.
    pub fn serving() -> Self {
        Self {
            state: HealthState::Healthy,
            ready: true,
            ever_healthy: true,
            ..Self::unknown()
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == HealthState::Healthy && self.ready
    }
}

/// A state transition caused by one probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChange {
    pub from: HealthState,
    pub to: HealthState,
}

/// Applies probe outcomes against the configured failure thresholds.
#[derive(Debug, Clone, Copy)]
pub struct HealthEvaluator {
    liveness_threshold: u32,
    readiness_threshold: u32,
}

impl HealthEvaluator {
    pub fn new(liveness_threshold: u32, readiness_threshold: u32) -> Self {
        Self {
            liveness_threshold: liveness_threshold.max(1),
            readiness_threshold: readiness_threshold.max(1),
        }
    }

    pub fn from_config(probes: &ProbesConfig) -> Self {
        Self::new(
            probes.liveness.failure_threshold,
            probes.readiness.failure_threshold,
        )
    }

    /// Fold one outcome into `health`, returning the state change if any.
    ///
    /// Transient and definitive failures count the same; the distinction
    /// only matters for observability.
    pub fn apply(
        &self,
        health: &mut InstanceHealth,
        kind: ProbeKind,
        outcome: &ProbeOutcome,
    ) -> Option<HealthChange> {
        let from = health.state;

        match (kind, outcome.is_success()) {
            (ProbeKind::Liveness, true) => {
                health.liveness_failures = 0;
            }
            (ProbeKind::Liveness, false) => {
                health.liveness_failures = health.liveness_failures.saturating_add(1);
                if health.liveness_failures >= self.liveness_threshold {
                    health.needs_replacement = true;
                    health.ready = false;
                    health.state = HealthState::Unhealthy;
                }
            }
            (ProbeKind::Readiness, true) => {
                health.readiness_failures = 0;
                if !health.needs_replacement {
                    health.ready = true;
                    health.state = HealthState::Healthy;
                    health.ever_healthy = true;
                }
            }
            (ProbeKind::Readiness, false) => {
                health.readiness_failures = health.readiness_failures.saturating_add(1);
                if health.readiness_failures >= self.readiness_threshold {
                    health.ready = false;
                    health.state = HealthState::Unhealthy;
                }
            }
        }

        (health.state != from).then_some(HealthChange {
            from,
            to: health.state,
        })
    }
}
