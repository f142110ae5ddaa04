// ABOUTME: Per-rollout context: revisions, state, fleet, and counters for one transition.
// ABOUTME: Owned by exactly one controller; independent rollouts share nothing.

use serde::Serialize;

use super::fleet::{Fleet, FleetCounts};
use super::state::RolloutState;
use crate::types::{Revision, ServiceName};

/// Every retried or refused operation, so nothing fails silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub created: u32,
    pub destroyed: u32,
    pub probe_results: u64,
    pub probe_failures: u64,
    pub transient_probe_failures: u64,
    /// New instances destroyed after failing liveness.
    pub replacements: u32,
    /// Removals the disruption budget turned down.
    pub budget_refusals: u32,
    pub backend_failures: u32,
    pub backend_retries: u32,
    pub rejected_commands: u32,
}

#[derive(Debug)]
pub struct RolloutContext {
    pub service: ServiceName,
    /// Revision restored on abort; None on a first rollout.
    pub baseline: Option<Revision>,
    pub target: Revision,
    pub state: RolloutState,
    pub fleet: Fleet,
    pub counters: Counters,
}

/// Read-only view published to operator surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolloutSnapshot {
    pub state: RolloutState,
    pub counts: FleetCounts,
    pub counters: Counters,
    /// Instances cleanup could not get rid of or bring back.
    pub leftovers: u32,
}

impl RolloutContext {
    pub fn new(target: Revision, baseline: Option<Revision>, state: RolloutState) -> Self {
        Self {
            service: target.service.clone(),
            baseline,
            target,
            state,
            fleet: Fleet::new(),
            counters: Counters::default(),
        }
    }

    pub fn desired(&self) -> u32 {
        self.target.replicas
    }

    pub fn snapshot(&self, leftovers: u32) -> RolloutSnapshot {
        RolloutSnapshot {
            state: self.state.clone(),
            counts: self.fleet.counts(),
            counters: self.counters,
            leftovers,
        }
    }
}
