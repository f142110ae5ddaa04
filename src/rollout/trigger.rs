// ABOUTME: Rollback trigger: error rate of new instances and the progress deadline.
// ABOUTME: Fires at most once per rollout; later firings are ignored.

use std::time::Duration;
use tokio::time::Instant;

use super::state::{AbortReason, RolloutStatus};
use crate::types::InstanceId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerSettings {
    /// Fraction of new instances that may go unhealthy; above it we roll back.
    pub error_threshold: f64,
    pub observation_window: Duration,
    pub progress_deadline: Duration,
}

#[derive(Debug, Clone)]
struct Observation {
    instance: InstanceId,
    created_at: Instant,
    unhealthy_at: Option<Instant>,
}

#[derive(Debug)]
pub struct RollbackTrigger {
    settings: TriggerSettings,
    started: Instant,
    paused_since: Option<Instant>,
    paused_total: Duration,
    observations: Vec<Observation>,
    fired: Option<AbortReason>,
}

impl RollbackTrigger {
    pub fn new(settings: TriggerSettings, started: Instant) -> Self {
        Self {
            settings,
            started,
            paused_since: None,
            paused_total: Duration::ZERO,
            observations: Vec::new(),
            fired: None,
        }
    }

    /// A new-revision instance was created.
    pub fn record_created(&mut self, instance: &InstanceId, now: Instant) {
        self.observations.push(Observation {
            instance: instance.clone(),
            created_at: now,
            unhealthy_at: None,
        });
    }

    /// A new-revision instance went unhealthy. Only the first report counts.
    pub fn record_unhealthy(&mut self, instance: &InstanceId, now: Instant) {
        if let Some(obs) = self
            .observations
            .iter_mut()
            .find(|o| &o.instance == instance && o.unhealthy_at.is_none())
        {
            obs.unhealthy_at = Some(now);
        }
    }

    /// Time spent paused does not count against the deadline.
    pub fn pause(&mut self, now: Instant) {
        if self.paused_since.is_none() {
            self.paused_since = Some(now);
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if let Some(since) = self.paused_since.take() {
            self.paused_total = self
                .paused_total
                .saturating_add(now.saturating_duration_since(since));
        }
    }

    /// Unhealthy fraction of new instances created within the window.
    pub fn error_rate(&self, now: Instant) -> Option<f64> {
        let window_start = now.checked_sub(self.settings.observation_window);
        let (created, unhealthy) = self
            .observations
            .iter()
            .filter(|o| window_start.is_none_or(|start| o.created_at >= start))
            .fold((0u32, 0u32), |(created, unhealthy), o| {
                (created + 1, unhealthy + u32::from(o.unhealthy_at.is_some()))
            });
        (created > 0).then(|| f64::from(unhealthy) / f64::from(created))
    }

    /// `None` when the deadline lies beyond what the clock can represent.
    pub fn deadline(&self, now: Instant) -> Option<Instant> {
        let ongoing = self
            .paused_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        let allowed = self
            .settings
            .progress_deadline
            .checked_add(self.paused_total)?
            .checked_add(ongoing)?;
        self.started.checked_add(allowed)
    }

    /// Check thresholds. Only a progressing rollout that has not fired yet
    /// can produce a reason.
    pub fn evaluate(&self, now: Instant, status: RolloutStatus) -> Option<AbortReason> {
        if self.fired.is_some() || status != RolloutStatus::Progressing {
            return None;
        }
        if let Some(rate) = self.error_rate(now)
            && rate > self.settings.error_threshold
        {
            tracing::warn!(
                error_rate = rate,
                threshold = self.settings.error_threshold,
                "new revision error rate over threshold"
            );
            return Some(AbortReason::ErrorRate);
        }
        if self.deadline(now).is_some_and(|deadline| now >= deadline) {
            tracing::warn!(
                deadline_secs = self.settings.progress_deadline.as_secs(),
                "progress deadline exceeded"
            );
            return Some(AbortReason::Timeout);
        }
        None
    }

    /// Record the firing. Returns false when it had already fired.
    pub fn fire(&mut self, reason: AbortReason) -> bool {
        if self.fired.is_some() {
            return false;
        }
        self.fired = Some(reason);
        true
    }

    pub fn fired(&self) -> Option<AbortReason> {
        self.fired
    }
}
