// ABOUTME: Runs liveness and readiness checks for each instance as independent periodic tasks.
// ABOUTME: Results are queued; the controller drains the queue on its own tick.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{ProbeKind, ProbeOutcome, ProbeResult, ProbeTarget};
use crate::config::{ProbeConfig, ProbesConfig};
use crate::types::{Instance, InstanceId};

pub struct ProbeScheduler {
    target: Arc<dyn ProbeTarget>,
    probes: ProbesConfig,
    tx: mpsc::UnboundedSender<ProbeResult>,
    rx: mpsc::UnboundedReceiver<ProbeResult>,
    tasks: HashMap<InstanceId, Vec<JoinHandle<()>>>,
}

impl ProbeScheduler {
    pub fn new(target: Arc<dyn ProbeTarget>, probes: ProbesConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            target,
            probes,
            tx,
            rx,
            tasks: HashMap::new(),
        }
    }

    /// Start probing `instance`. Watching an instance twice is a no-op.
    pub fn watch(&mut self, instance: &Instance) {
        if self.tasks.contains_key(&instance.id) {
            return;
        }
        let handles = [
            (ProbeKind::Liveness, self.probes.liveness.clone()),
            (ProbeKind::Readiness, self.probes.readiness.clone()),
        ]
        .into_iter()
        .map(|(kind, config)| {
            tokio::spawn(probe_loop(
                Arc::clone(&self.target),
                instance.clone(),
                kind,
                config,
                self.tx.clone(),
            ))
        })
        .collect();
        self.tasks.insert(instance.id.clone(), handles);
    }

    /// Stop probing an instance. Results already queued are still drained.
    pub fn forget(&mut self, id: &InstanceId) {
        if let Some(handles) = self.tasks.remove(id) {
            for handle in handles {
                handle.abort();
            }
        }
    }

    pub fn is_watching(&self, id: &InstanceId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Everything reported since the last drain, in arrival order.
    pub fn drain(&mut self) -> Vec<ProbeResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            results.push(result);
        }
        results
    }

    pub fn shutdown(&mut self) {
        for (_, handles) in self.tasks.drain() {
            for handle in handles {
                handle.abort();
            }
        }
    }
}

impl Drop for ProbeScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn probe_loop(
    target: Arc<dyn ProbeTarget>,
    instance: Instance,
    kind: ProbeKind,
    config: ProbeConfig,
    tx: mpsc::UnboundedSender<ProbeResult>,
) {
    if !config.initial_delay.is_zero() {
        tokio::time::sleep(config.initial_delay).await;
    }

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let outcome = match tokio::time::timeout(
            config.timeout,
            target.check(&instance, kind, &config),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::Transient(format!(
                "{kind} check timed out after {}ms",
                config.timeout.as_millis()
            )),
        };

        if let ProbeOutcome::Transient(ref reason) | ProbeOutcome::Failure(ref reason) = outcome {
            tracing::debug!(instance = %instance.id, %kind, reason = %reason, "probe failed");
        }

        let result = ProbeResult {
            instance: instance.id.clone(),
            kind,
            outcome,
        };
        if tx.send(result).is_err() {
            break;
        }
    }
}
