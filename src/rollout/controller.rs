// ABOUTME: Rollout controller: the single writer that drives one revision transition.
// ABOUTME: Each tick drains probe results, reconciles with the backend, checks the trigger, then steps.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::command::Command;
use super::context::{RolloutContext, RolloutSnapshot};
use super::error::RolloutError;
use super::fleet::Role;
use super::retry::{RetryPolicy, retry_call, with_timeout};
use super::state::{AbortReason, RolloutState, RolloutStatus};
use super::trigger::{RollbackTrigger, TriggerSettings};
use crate::backend::{BackendError, InstanceBackend};
use crate::budget::{self, DisruptionBudget, DisruptionGuard};
use crate::config::{BackendConfig, Config, ProbesConfig, RolloutConfig};
use crate::events::{EventSink, RemovalCause, RolloutEvent};
use crate::probe::{
    HealthEvaluator, HealthState, InstanceHealth, ProbeOutcome, ProbeScheduler, ProbeTarget,
};
use crate::types::{Instance, InstanceId, Quantity, Revision};

/// Everything that tunes a rollout, resolved from configuration.
#[derive(Debug, Clone)]
pub struct RolloutSettings {
    pub max_surge: Quantity,
    pub max_unavailable: Quantity,
    /// None means `replicas - unavailable`, tracking set-unavailable commands.
    pub min_available: Option<Quantity>,
    pub error_threshold: f64,
    pub observation_window: Duration,
    pub progress_deadline: Duration,
    pub tick: Duration,
    pub probes: ProbesConfig,
    pub retry: RetryPolicy,
}

impl Default for RolloutSettings {
    fn default() -> Self {
        let rollout = RolloutConfig::default();
        let backend = BackendConfig::default();
        Self {
            max_surge: rollout.max_surge,
            max_unavailable: rollout.max_unavailable,
            min_available: None,
            error_threshold: rollout.error_threshold,
            observation_window: rollout.observation_window,
            progress_deadline: rollout.progress_deadline,
            tick: rollout.tick,
            probes: ProbesConfig::default(),
            retry: RetryPolicy {
                call_timeout: backend.call_timeout,
                retry_budget: backend.retry_budget,
                backoff: backend.backoff,
                max_backoff: backend.max_backoff,
            },
        }
    }
}

impl RolloutSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_surge: config.rollout.max_surge,
            max_unavailable: config.rollout.max_unavailable,
            min_available: config.disruption.min_available,
            error_threshold: config.rollout.error_threshold,
            observation_window: config.rollout.observation_window,
            progress_deadline: config.rollout.progress_deadline,
            tick: config.rollout.tick,
            probes: config.probes.clone(),
            retry: RetryPolicy {
                call_timeout: config.backend.call_timeout,
                retry_budget: config.backend.retry_budget,
                backoff: config.backend.backoff,
                max_backoff: config.backend.max_backoff,
            },
        }
    }

    fn trigger(&self) -> TriggerSettings {
        TriggerSettings {
            error_threshold: self.error_threshold,
            observation_window: self.observation_window,
            progress_deadline: self.progress_deadline,
        }
    }
}

/// What an accepted command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    /// Already in the requested state.
    Unchanged,
    /// The disruption budget approved the eviction and the instance is gone.
    Evicted,
    /// The disruption budget turned the eviction down; try again later.
    Refused,
}

#[derive(Debug, Default)]
struct BackoffState {
    failures: u32,
    not_before: Option<Instant>,
}

pub struct RolloutController {
    ctx: RolloutContext,
    settings: RolloutSettings,
    backend: Arc<dyn InstanceBackend>,
    sink: Arc<dyn EventSink>,
    scheduler: ProbeScheduler,
    evaluator: HealthEvaluator,
    guard: DisruptionGuard,
    trigger: RollbackTrigger,
    backoff: BackoffState,
    /// Instances we destroyed; never adopted again even if a list still shows them.
    tombstones: HashSet<InstanceId>,
    leftovers: u32,
    snapshots: watch::Sender<RolloutSnapshot>,
}

impl RolloutController {
    /// Discover what is running and begin a rollout to `target`.
    ///
    /// Running instances of other revisions become the serving baseline;
    /// instances already on `target` (from an earlier attempt) are adopted
    /// and probed like fresh ones.
    pub async fn start(
        settings: RolloutSettings,
        target: Revision,
        backend: Arc<dyn InstanceBackend>,
        probe: Arc<dyn ProbeTarget>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, RolloutError> {
        if target.replicas == 0 {
            return Err(RolloutError::InvalidBudget(
                "desired replica count must be at least 1".into(),
            ));
        }
        let budgets = budget::resolve_budgets(
            target.replicas,
            settings.max_surge,
            settings.max_unavailable,
            settings.min_available,
        )
        .map_err(RolloutError::InvalidBudget)?;

        let running = with_timeout(
            settings.retry.call_timeout,
            "list",
            backend.list_service(&target.service),
        )
        .await?;

        let baseline = running
            .iter()
            .filter(|i| i.revision != target.id)
            .max_by_key(|i| i.created_at)
            .map(|newest| {
                Revision::new(
                    target.service.clone(),
                    newest.revision.clone(),
                    newest.image.clone(),
                    target.replicas,
                )
            });

        let state = RolloutState::new(
            baseline.as_ref().map(|b| b.id.clone()),
            target.id.clone(),
            budgets.surge,
            budgets.unavailable,
        );
        let now = Instant::now();
        let ctx = RolloutContext::new(target, baseline, state);
        let (snapshots, _) = watch::channel(ctx.snapshot(0));
        let mut controller = Self {
            ctx,
            evaluator: HealthEvaluator::from_config(&settings.probes),
            scheduler: ProbeScheduler::new(probe, settings.probes.clone()),
            guard: DisruptionGuard::new(DisruptionBudget::new(budgets.min_available)),
            trigger: RollbackTrigger::new(settings.trigger(), now),
            settings,
            backend,
            sink,
            backoff: BackoffState::default(),
            tombstones: HashSet::new(),
            leftovers: 0,
            snapshots,
        };

        for instance in running {
            let role = if instance.revision == controller.ctx.target.id {
                controller.trigger.record_created(&instance.id, now);
                Role::New
            } else {
                Role::Old
            };
            let health = match role {
                Role::Old => InstanceHealth::serving(),
                Role::New => InstanceHealth::unknown(),
            };
            controller.scheduler.watch(&instance);
            let id = instance.id.clone();
            controller.ctx.fleet.insert(instance, role, health);
            if let Some(record) = controller.ctx.fleet.get_mut(&id) {
                record.confirmed = true;
            }
        }

        let counts = controller.ctx.fleet.counts();
        tracing::info!(
            service = %controller.ctx.service,
            from = ?controller.ctx.state.old_revision.as_ref().map(|r| r.to_string()),
            to = %controller.ctx.target.id,
            replicas = controller.ctx.desired(),
            surge = budgets.surge,
            unavailable = budgets.unavailable,
            min_available = budgets.min_available,
            old = counts.old,
            adopted_new = counts.new,
            "rollout started"
        );
        controller.emit(RolloutEvent::RolloutStarted {
            service: controller.ctx.service.clone(),
            from: controller.ctx.state.old_revision.clone(),
            to: controller.ctx.target.id.clone(),
            replicas: controller.ctx.desired(),
            surge: budgets.surge,
            unavailable: budgets.unavailable,
        });
        controller.publish();
        Ok(controller)
    }

    pub fn status(&self) -> RolloutStatus {
        self.ctx.state.status
    }

    pub fn context(&self) -> &RolloutContext {
        &self.ctx
    }

    pub fn settings(&self) -> &RolloutSettings {
        &self.settings
    }

    pub fn guard(&self) -> &DisruptionGuard {
        &self.guard
    }

    pub fn snapshot(&self) -> RolloutSnapshot {
        self.ctx.snapshot(self.leftovers)
    }

    pub fn subscribe(&self) -> watch::Receiver<RolloutSnapshot> {
        self.snapshots.subscribe()
    }

    // =========================================================================
    // Control loop
    // =========================================================================

    /// One pass of the control loop.
    pub async fn tick(&mut self) {
        if self.ctx.state.status.is_terminal() {
            return;
        }
        let now = Instant::now();

        self.apply_probe_results(now);

        if let Err(e) = self.reconcile(now).await {
            self.backend_failed(e, now).await;
            self.publish();
            return;
        }

        if self.ctx.state.status == RolloutStatus::Paused {
            self.publish();
            return;
        }

        if let Some(reason) = self.trigger.evaluate(now, self.ctx.state.status) {
            self.abort(reason).await;
            return;
        }

        if self.backoff.not_before.is_some_and(|t| now < t) {
            self.publish();
            return;
        }

        match self.step(now).await {
            Ok(()) => self.backoff = BackoffState::default(),
            Err(e) => {
                self.backend_failed(e, Instant::now()).await;
                if self.ctx.state.status.is_terminal() {
                    return;
                }
            }
        }

        self.check_succeeded();
        self.publish();
    }

    fn apply_probe_results(&mut self, now: Instant) {
        for result in self.scheduler.drain() {
            let counters = &mut self.ctx.counters;
            counters.probe_results += 1;
            match result.outcome {
                ProbeOutcome::Success => {}
                ProbeOutcome::Transient(_) => counters.transient_probe_failures += 1,
                ProbeOutcome::Failure(_) => counters.probe_failures += 1,
            }

            // Results for instances we already removed are dropped.
            let Some(record) = self.ctx.fleet.get_mut(&result.instance) else {
                continue;
            };
            let Some(change) = self
                .evaluator
                .apply(&mut record.health, result.kind, &result.outcome)
            else {
                continue;
            };

            let role = record.role;
            let revision = record.instance.revision.clone();
            if change.to == HealthState::Unhealthy && role == Role::New {
                self.trigger.record_unhealthy(&result.instance, now);
            }
            tracing::info!(
                instance = %result.instance,
                %revision,
                probe = %result.kind,
                from = %change.from,
                to = %change.to,
                "instance health changed"
            );
            self.emit(RolloutEvent::InstanceHealthChanged {
                instance: result.instance,
                revision,
                from: change.from,
                to: change.to,
            });
        }
    }

    /// Confirm tracked instances against the backend's listing.
    ///
    /// A record is only dropped when it was seen before and is gone now, so
    /// a create that has not shown up in `list` yet is left alone.
    async fn reconcile(&mut self, now: Instant) -> Result<(), BackendError> {
        let timeout = self.settings.retry.call_timeout;
        let listed_new = with_timeout(timeout, "list", self.backend.list(&self.ctx.target)).await?;
        let listed_all = with_timeout(
            timeout,
            "list",
            self.backend.list_service(&self.ctx.service),
        )
        .await?;

        let new_ids: HashSet<InstanceId> = listed_new.iter().map(|i| i.id.clone()).collect();
        let old_ids: HashSet<InstanceId> = listed_all
            .iter()
            .filter(|i| i.revision != self.ctx.target.id)
            .map(|i| i.id.clone())
            .collect();

        for instance in listed_new {
            if self.tombstones.contains(&instance.id) {
                continue;
            }
            if let Some(record) = self.ctx.fleet.get_mut(&instance.id) {
                record.confirmed = true;
                continue;
            }
            // Typically a create whose response we never saw (it timed out).
            tracing::info!(instance = %instance.id, "adopting untracked instance of new revision");
            self.scheduler.watch(&instance);
            self.trigger.record_created(&instance.id, now);
            let id = instance.id.clone();
            self.ctx
                .fleet
                .insert(instance, Role::New, InstanceHealth::unknown());
            if let Some(record) = self.ctx.fleet.get_mut(&id) {
                record.confirmed = true;
            }
        }

        for record in self.ctx.fleet.iter_mut() {
            if record.role == Role::Old && old_ids.contains(record.id()) {
                record.confirmed = true;
            }
        }

        let vanished: Vec<InstanceId> = self
            .ctx
            .fleet
            .iter()
            .filter(|r| r.confirmed)
            .filter(|r| match r.role {
                Role::New => !new_ids.contains(r.id()),
                Role::Old => !old_ids.contains(r.id()),
            })
            .map(|r| r.id().clone())
            .collect();
        for id in vanished {
            tracing::warn!(instance = %id, "instance disappeared from backend");
            self.scheduler.forget(&id);
            self.ctx.fleet.remove(&id);
        }

        Ok(())
    }

    /// Replace failed instances, add new ones within surge, retire old ones.
    async fn step(&mut self, now: Instant) -> Result<(), BackendError> {
        self.replace_failed().await?;
        self.scale_up(now).await?;
        self.scale_down().await?;
        self.trim_surplus().await?;
        Ok(())
    }

    /// Destroy new instances whose liveness failed past the threshold.
    /// Failure-driven, so the disruption budget is not consulted.
    async fn replace_failed(&mut self) -> Result<(), BackendError> {
        let failed: Vec<Instance> = self
            .ctx
            .fleet
            .with_role(Role::New)
            .filter(|r| r.health.needs_replacement)
            .map(|r| r.instance.clone())
            .collect();

        for instance in failed {
            self.destroy(&instance, RemovalCause::FailedLiveness).await?;
            self.ctx.counters.replacements += 1;
        }
        Ok(())
    }

    async fn scale_up(&mut self, now: Instant) -> Result<(), BackendError> {
        let desired = self.ctx.desired();
        loop {
            let counts = self.ctx.fleet.counts();
            let ceiling = desired.saturating_add(self.ctx.state.surge);
            if counts.new >= desired || counts.total() >= ceiling {
                return Ok(());
            }

            let instance = with_timeout(
                self.settings.retry.call_timeout,
                "create",
                self.backend.create(&self.ctx.target),
            )
            .await?;

            tracing::info!(instance = %instance.id, revision = %instance.revision, "created instance");
            self.ctx.counters.created += 1;
            self.trigger.record_created(&instance.id, now);
            self.scheduler.watch(&instance);
            self.emit(RolloutEvent::InstanceCreated {
                instance: instance.id.clone(),
                revision: instance.revision.clone(),
            });
            self.ctx
                .fleet
                .insert(instance, Role::New, InstanceHealth::unknown());
        }
    }

    /// Retire old instances while a proven replacement exists and both the
    /// unavailable budget and the disruption guard allow it. Oldest first.
    async fn scale_down(&mut self) -> Result<(), BackendError> {
        let floor = self
            .ctx
            .desired()
            .saturating_sub(self.ctx.state.unavailable);

        loop {
            if self.ctx.state.updated >= self.ctx.fleet.proven_new() {
                return Ok(());
            }
            // Unavailable old instances go first.
            let Some(candidate) = self
                .ctx
                .fleet
                .with_role(Role::Old)
                .filter(|r| !r.is_available())
                .min_by_key(|r| r.instance.created_at)
                .or_else(|| self.ctx.fleet.oldest(Role::Old, |_| false))
                .map(|r| (r.instance.clone(), r.is_available()))
            else {
                return Ok(());
            };
            let (instance, available) = candidate;

            let available_after = self.ctx.fleet.available() - u32::from(available);
            if available_after < floor {
                tracing::debug!(available_after, floor, "waiting: unavailable budget exhausted");
                return Ok(());
            }

            let Some(permit) = self.guard.admit(&self.ctx.fleet, &instance.id) else {
                self.ctx.counters.budget_refusals += 1;
                return Ok(());
            };

            with_timeout(
                self.settings.retry.call_timeout,
                "destroy",
                self.backend.destroy(&instance),
            )
            .await?;
            drop(permit);

            self.forget_instance(&instance, RemovalCause::Replaced);
            self.ctx.state.updated += 1;
            tracing::info!(
                instance = %instance.id,
                updated = self.ctx.state.updated,
                "retired old instance"
            );
        }
    }

    /// Remove new instances beyond the desired count once no old ones remain,
    /// e.g. after adopting leftovers from an earlier attempt.
    async fn trim_surplus(&mut self) -> Result<(), BackendError> {
        let desired = self.ctx.desired();
        loop {
            let counts = self.ctx.fleet.counts();
            if counts.old > 0 || counts.new <= desired {
                return Ok(());
            }
            let Some(instance) = self
                .ctx
                .fleet
                .with_role(Role::New)
                .filter(|r| !r.is_available())
                .min_by_key(|r| r.instance.created_at)
                .or_else(|| self.ctx.fleet.oldest(Role::New, |_| false))
                .map(|r| r.instance.clone())
            else {
                return Ok(());
            };

            let Some(permit) = self.guard.admit(&self.ctx.fleet, &instance.id) else {
                self.ctx.counters.budget_refusals += 1;
                return Ok(());
            };
            with_timeout(
                self.settings.retry.call_timeout,
                "destroy",
                self.backend.destroy(&instance),
            )
            .await?;
            drop(permit);
            self.forget_instance(&instance, RemovalCause::Replaced);
        }
    }

    fn check_succeeded(&mut self) {
        if self.ctx.state.status != RolloutStatus::Progressing {
            return;
        }
        let counts = self.ctx.fleet.counts();
        let desired = self.ctx.desired();
        if counts.old == 0 && counts.new == desired && counts.new_available == desired {
            self.ctx.state.status = RolloutStatus::Succeeded;
            self.scheduler.shutdown();
            tracing::info!(
                revision = %self.ctx.target.id,
                replicas = desired,
                updated = self.ctx.state.updated,
                "rollout succeeded"
            );
            self.emit(RolloutEvent::RolloutSucceeded {
                revision: self.ctx.target.id.clone(),
                replicas: desired,
            });
        }
    }

    /// Count a failed backend call; escalate to an abort past the retry budget.
    async fn backend_failed(&mut self, error: BackendError, now: Instant) {
        self.ctx.counters.backend_failures += 1;
        self.backoff.failures += 1;
        let failures = self.backoff.failures;

        if self.settings.retry.exhausted(failures) {
            tracing::error!(
                failures,
                retry_budget = self.settings.retry.retry_budget,
                error = %error,
                "backend retry budget exhausted"
            );
            self.abort(AbortReason::BackendError).await;
            return;
        }

        self.ctx.counters.backend_retries += 1;
        let delay = self.settings.retry.delay(failures);
        self.backoff.not_before = Some(now + delay);
        tracing::warn!(
            failures,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "backend call failed, backing off"
        );
    }

    // =========================================================================
    // Abort and rollback
    // =========================================================================

    /// Roll back to the baseline. Idempotent: aborting a finished rollout
    /// changes nothing.
    pub async fn abort(&mut self, reason: AbortReason) {
        if self.ctx.state.status.is_terminal() {
            return;
        }
        self.trigger.fire(reason);
        self.ctx.state.status = RolloutStatus::Aborted;
        self.ctx.state.abort_reason = Some(reason);
        tracing::warn!(%reason, revision = %self.ctx.target.id, "aborting rollout");

        self.rollback().await;
        self.scheduler.shutdown();

        let restored = self
            .ctx
            .fleet
            .with_role(Role::Old)
            .filter(|r| !r.health.needs_replacement)
            .count() as u32;
        self.emit(RolloutEvent::RolloutAborted {
            reason,
            restored,
            leftovers: self.leftovers,
        });
        self.publish();
    }

    /// Bring the baseline back to the desired count first, then remove every
    /// new-revision instance, including any the backend lists that we never
    /// tracked. Baseline instances whose liveness failed are replaced too.
    async fn rollback(&mut self) {
        let backend = Arc::clone(&self.backend);
        let policy = self.settings.retry;

        let dead: Vec<Instance> = self
            .ctx
            .fleet
            .with_role(Role::Old)
            .filter(|r| r.health.needs_replacement)
            .map(|r| r.instance.clone())
            .collect();
        for instance in dead {
            match retry_call(&policy, "destroy", || backend.destroy(&instance)).await {
                Ok(()) => {
                    self.forget_instance(&instance, RemovalCause::FailedLiveness);
                    self.ctx.counters.replacements += 1;
                }
                Err(e) => {
                    self.leftovers += 1;
                    tracing::error!(instance = %instance.id, error = %e, "failed to remove dead baseline instance");
                }
            }
        }

        if let Some(baseline) = self.ctx.baseline.clone() {
            let serving = self
                .ctx
                .fleet
                .with_role(Role::Old)
                .filter(|r| !r.health.needs_replacement)
                .count() as u32;
            for _ in serving..self.ctx.desired() {
                match retry_call(&policy, "create", || backend.create(&baseline)).await {
                    Ok(instance) => {
                        self.ctx.counters.created += 1;
                        self.emit(RolloutEvent::InstanceCreated {
                            instance: instance.id.clone(),
                            revision: instance.revision.clone(),
                        });
                        self.ctx
                            .fleet
                            .insert(instance, Role::Old, InstanceHealth::unknown());
                    }
                    Err(e) => {
                        self.leftovers += 1;
                        tracing::error!(error = %e, revision = %baseline.id, "failed to restore baseline instance");
                    }
                }
            }
        }

        let mut doomed: Vec<Instance> = self
            .ctx
            .fleet
            .with_role(Role::New)
            .map(|r| r.instance.clone())
            .collect();
        let target = self.ctx.target.clone();
        match retry_call(&policy, "list", || backend.list(&target)).await {
            Ok(listed) => {
                for instance in listed {
                    let known = doomed.iter().any(|d| d.id == instance.id);
                    if !known && !self.tombstones.contains(&instance.id) {
                        doomed.push(instance);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not list new revision during rollback"),
        }

        for instance in doomed {
            match retry_call(&policy, "destroy", || backend.destroy(&instance)).await {
                Ok(()) => self.forget_instance(&instance, RemovalCause::Rollback),
                Err(e) => {
                    self.leftovers += 1;
                    tracing::error!(instance = %instance.id, error = %e, "failed to remove instance during rollback");
                }
            }
        }
    }

    // =========================================================================
    // Operator commands
    // =========================================================================

    /// Apply an operator command. Invalid commands are rejected without
    /// touching the rollout state.
    pub async fn apply(&mut self, command: Command) -> Result<CommandOutcome, RolloutError> {
        let status = self.ctx.state.status;
        let result = if status.is_terminal() {
            match command {
                Command::Cancel => Ok(CommandOutcome::Unchanged),
                _ => Err(RolloutError::Finished(status)),
            }
        } else {
            self.apply_live(&command).await
        };

        match &result {
            Ok(outcome) => tracing::info!(command = %command, ?outcome, "operator command"),
            Err(e) => {
                self.ctx.counters.rejected_commands += 1;
                tracing::warn!(command = %command, error = %e, "operator command rejected");
            }
        }
        self.publish();
        result
    }

    async fn apply_live(&mut self, command: &Command) -> Result<CommandOutcome, RolloutError> {
        let now = Instant::now();
        match command {
            Command::Pause => {
                if self.ctx.state.status == RolloutStatus::Paused {
                    return Ok(CommandOutcome::Unchanged);
                }
                self.ctx.state.status = RolloutStatus::Paused;
                self.trigger.pause(now);
                self.emit(RolloutEvent::RolloutPaused);
                Ok(CommandOutcome::Applied)
            }
            Command::Resume => {
                if self.ctx.state.status == RolloutStatus::Progressing {
                    return Ok(CommandOutcome::Unchanged);
                }
                self.ctx.state.status = RolloutStatus::Progressing;
                self.trigger.resume(now);
                self.emit(RolloutEvent::RolloutResumed);
                Ok(CommandOutcome::Applied)
            }
            Command::Cancel => {
                self.abort(AbortReason::Manual).await;
                Ok(CommandOutcome::Applied)
            }
            Command::SetSurge(quantity) => {
                let surge = budget::resolve_surge(self.ctx.desired(), *quantity)
                    .map_err(RolloutError::InvalidCommand)?;
                self.ctx.state.surge = surge;
                self.emit_budget_changed();
                Ok(CommandOutcome::Applied)
            }
            Command::SetUnavailable(quantity) => {
                let desired = self.ctx.desired();
                let unavailable = budget::resolve_unavailable(desired, *quantity)
                    .map_err(RolloutError::InvalidCommand)?;
                let min_available =
                    budget::resolve_min_available(desired, unavailable, self.settings.min_available)
                        .map_err(RolloutError::InvalidCommand)?;
                self.ctx.state.unavailable = unavailable;
                self.guard.set_budget(DisruptionBudget::new(min_available));
                self.emit_budget_changed();
                Ok(CommandOutcome::Applied)
            }
            Command::Evict(id) => self.evict(id).await,
        }
    }

    /// Voluntary disruption of one instance, gated by the disruption budget.
    async fn evict(&mut self, id: &InstanceId) -> Result<CommandOutcome, RolloutError> {
        let instance = self
            .ctx
            .fleet
            .get(id)
            .map(|r| r.instance.clone())
            .ok_or_else(|| RolloutError::InvalidCommand(format!("unknown instance '{id}'")))?;

        let Some(permit) = self.guard.admit(&self.ctx.fleet, id) else {
            self.ctx.counters.budget_refusals += 1;
            return Ok(CommandOutcome::Refused);
        };

        let destroyed = with_timeout(
            self.settings.retry.call_timeout,
            "destroy",
            self.backend.destroy(&instance),
        )
        .await;
        drop(permit);

        if let Err(e) = destroyed {
            self.ctx.counters.backend_failures += 1;
            return Err(e.into());
        }
        self.forget_instance(&instance, RemovalCause::Evicted);
        Ok(CommandOutcome::Evicted)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn destroy(&mut self, instance: &Instance, cause: RemovalCause) -> Result<(), BackendError> {
        with_timeout(
            self.settings.retry.call_timeout,
            "destroy",
            self.backend.destroy(instance),
        )
        .await?;
        self.forget_instance(instance, cause);
        Ok(())
    }

    /// Drop a destroyed instance from the fleet and stop probing it.
    fn forget_instance(&mut self, instance: &Instance, cause: RemovalCause) {
        self.scheduler.forget(&instance.id);
        self.ctx.fleet.remove(&instance.id);
        self.tombstones.insert(instance.id.clone());
        self.ctx.counters.destroyed += 1;
        tracing::debug!(instance = %instance.id, %cause, "removed instance");
        self.emit(RolloutEvent::InstanceRemoved {
            instance: instance.id.clone(),
            revision: instance.revision.clone(),
            cause,
        });
    }

    fn emit_budget_changed(&self) {
        self.emit(RolloutEvent::BudgetChanged {
            surge: self.ctx.state.surge,
            unavailable: self.ctx.state.unavailable,
            min_available: self.guard.budget().min_available,
        });
    }

    fn emit(&self, event: RolloutEvent) {
        self.sink.emit(&event);
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}
