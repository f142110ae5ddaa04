// ABOUTME: Structured rollout events and the sinks that receive them.
// ABOUTME: Events serialize as tagged JSON objects, e.g. {"event":"rollout_aborted","reason":"error-rate"}.

use parking_lot::Mutex;
use serde::Serialize;

use crate::probe::HealthState;
use crate::rollout::AbortReason;
use crate::types::{InstanceId, RevisionId, ServiceName};

/// Why an instance was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalCause {
    /// Old instance retired after its replacement became healthy.
    Replaced,
    /// New instance failed liveness and is being replaced.
    FailedLiveness,
    /// Operator-requested voluntary disruption.
    Evicted,
    /// Removed while rolling back.
    Rollback,
}

impl std::fmt::Display for RemovalCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemovalCause::Replaced => write!(f, "replaced"),
            RemovalCause::FailedLiveness => write!(f, "failed-liveness"),
            RemovalCause::Evicted => write!(f, "evicted"),
            RemovalCause::Rollback => write!(f, "rollback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RolloutEvent {
    RolloutStarted {
        service: ServiceName,
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<RevisionId>,
        to: RevisionId,
        replicas: u32,
        surge: u32,
        unavailable: u32,
    },
    InstanceCreated {
        instance: InstanceId,
        revision: RevisionId,
    },
    InstanceRemoved {
        instance: InstanceId,
        revision: RevisionId,
        cause: RemovalCause,
    },
    InstanceHealthChanged {
        instance: InstanceId,
        revision: RevisionId,
        from: HealthState,
        to: HealthState,
    },
    RolloutPaused,
    RolloutResumed,
    BudgetChanged {
        surge: u32,
        unavailable: u32,
        min_available: u32,
    },
    RolloutAborted {
        reason: AbortReason,
        /// Baseline instances running after cleanup.
        restored: u32,
        /// Instances cleanup could not remove or create.
        leftovers: u32,
    },
    RolloutSucceeded {
        revision: RevisionId,
        replicas: u32,
    },
}

impl RolloutEvent {
    /// The serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            RolloutEvent::RolloutStarted { .. } => "rollout_started",
            RolloutEvent::InstanceCreated { .. } => "instance_created",
            RolloutEvent::InstanceRemoved { .. } => "instance_removed",
            RolloutEvent::InstanceHealthChanged { .. } => "instance_health_changed",
            RolloutEvent::RolloutPaused => "rollout_paused",
            RolloutEvent::RolloutResumed => "rollout_resumed",
            RolloutEvent::BudgetChanged { .. } => "budget_changed",
            RolloutEvent::RolloutAborted { .. } => "rollout_aborted",
            RolloutEvent::RolloutSucceeded { .. } => "rollout_succeeded",
        }
    }
}

/// Receives every event a rollout emits, in order.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RolloutEvent);
}

/// Emits events as structured `tracing` records.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &RolloutEvent) {
        match event {
            RolloutEvent::RolloutAborted { reason, .. } => {
                tracing::warn!(event = event.name(), %reason, "rollout aborted");
            }
            RolloutEvent::InstanceHealthChanged {
                instance, from, to, ..
            } => {
                tracing::info!(event = event.name(), %instance, %from, %to, "instance health changed");
            }
            _ => match serde_json::to_string(event) {
                Ok(json) => tracing::info!(event = event.name(), details = %json),
                Err(_) => tracing::info!(event = event.name()),
            },
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RolloutEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RolloutEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(RolloutEvent::name).collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &RolloutEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Forwards each event to several sinks.
pub struct Fanout(pub Vec<std::sync::Arc<dyn EventSink>>);

impl EventSink for Fanout {
    fn emit(&self, event: &RolloutEvent) {
        for sink in &self.0 {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_event_serializes_with_reason_code() {
        let event = RolloutEvent::RolloutAborted {
            reason: AbortReason::ErrorRate,
            restored: 4,
            leftovers: 0,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "rollout_aborted");
        assert_eq!(json["reason"], "error-rate");
        assert_eq!(json["restored"], 4);
    }

    #[test]
    fn names_match_serialized_tags() {
        let events = [
            RolloutEvent::RolloutPaused,
            RolloutEvent::RolloutSucceeded {
                revision: RevisionId::new("v2"),
                replicas: 2,
            },
            RolloutEvent::InstanceRemoved {
                instance: InstanceId::new("a"),
                revision: RevisionId::new("v1"),
                cause: RemovalCause::Replaced,
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.name());
        }
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.emit(&RolloutEvent::RolloutPaused);
        sink.emit(&RolloutEvent::RolloutResumed);
        assert_eq!(sink.names(), vec!["rollout_paused", "rollout_resumed"]);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = std::sync::Arc::new(MemorySink::new());
        let b = std::sync::Arc::new(MemorySink::new());
        let fanout = Fanout(vec![a.clone(), b.clone()]);
        fanout.emit(&RolloutEvent::RolloutPaused);
        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);
    }
}
