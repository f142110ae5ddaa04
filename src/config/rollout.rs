// ABOUTME: Rollout pacing, rollback thresholds, disruption budget, and backend settings.
// ABOUTME: Defaults follow common orchestrator rolling-update defaults.

use serde::Deserialize;
use std::time::Duration;

use crate::types::Quantity;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RolloutConfig {
    #[serde(default = "default_max_surge")]
    pub max_surge: Quantity,

    #[serde(default = "default_max_unavailable")]
    pub max_unavailable: Quantity,

    /// Time allowed to reach Succeeded before the rollout is rolled back.
    #[serde(default = "default_progress_deadline", with = "humantime_serde")]
    pub progress_deadline: Duration,

    /// Sliding window over which the new revision's error rate is measured.
    #[serde(default = "default_observation_window", with = "humantime_serde")]
    pub observation_window: Duration,

    /// Fraction of unhealthy new instances (0, 1] that triggers rollback.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: f64,

    /// Control loop cadence.
    #[serde(default = "default_tick", with = "humantime_serde")]
    pub tick: Duration,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            max_surge: default_max_surge(),
            max_unavailable: default_max_unavailable(),
            progress_deadline: default_progress_deadline(),
            observation_window: default_observation_window(),
            error_threshold: default_error_threshold(),
            tick: default_tick(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DisruptionConfig {
    /// Defaults to `replicas - max_unavailable` when unset.
    #[serde(default)]
    pub min_available: Option<Quantity>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Docker or Podman through the local API socket.
    #[default]
    Container,
    /// In-process simulation, no real instances.
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// Explicit API socket; auto-detected when unset.
    #[serde(default)]
    pub socket: Option<String>,

    #[serde(default = "default_call_timeout", with = "humantime_serde")]
    pub call_timeout: Duration,

    /// Consecutive failed backend calls tolerated before aborting.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    #[serde(default = "default_backoff", with = "humantime_serde")]
    pub backoff: Duration,

    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            socket: None,
            call_timeout: default_call_timeout(),
            retry_budget: default_retry_budget(),
            backoff: default_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

fn default_max_surge() -> Quantity {
    Quantity::Absolute(1)
}

fn default_max_unavailable() -> Quantity {
    Quantity::Absolute(0)
}

fn default_progress_deadline() -> Duration {
    Duration::from_secs(600)
}

fn default_observation_window() -> Duration {
    Duration::from_secs(300)
}

fn default_error_threshold() -> f64 {
    0.5
}

fn default_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_budget() -> u32 {
    4
}

fn default_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(30)
}
