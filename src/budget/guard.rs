// ABOUTME: Disruption budget guard: the admission gate for voluntary instance removal.
// ABOUTME: Approvals reserve the instance until the permit drops, so concurrent callers cannot overdraw.

use parking_lot::Mutex;
use std::collections::HashSet;

use crate::rollout::Fleet;
use crate::types::InstanceId;

/// Minimum number of instances that must stay available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisruptionBudget {
    pub min_available: u32,
}

impl DisruptionBudget {
    pub fn new(min_available: u32) -> Self {
        Self { min_available }
    }

    pub fn allows(&self, available_after: u32) -> bool {
        available_after >= self.min_available
    }
}

struct GuardState {
    budget: DisruptionBudget,
    /// Approved removals that have not completed yet.
    pending: HashSet<InstanceId>,
}

pub struct DisruptionGuard {
    state: Mutex<GuardState>,
}

impl DisruptionGuard {
    pub fn new(budget: DisruptionBudget) -> Self {
        Self {
            state: Mutex::new(GuardState {
                budget,
                pending: HashSet::new(),
            }),
        }
    }

    pub fn budget(&self) -> DisruptionBudget {
        self.state.lock().budget
    }

    pub fn set_budget(&self, budget: DisruptionBudget) {
        self.state.lock().budget = budget;
    }

    /// Would removing `candidate` keep availability at or above the minimum?
    ///
    /// Counts available instances of every revision, minus the candidate and
    /// any removal already approved.
    pub fn can_remove(&self, fleet: &Fleet, candidate: &InstanceId) -> bool {
        let state = self.state.lock();
        state.check(fleet, candidate)
    }

    /// Approve and reserve the removal of `candidate`.
    ///
    /// The reservation lasts as long as the returned permit; drop it once
    /// the instance is gone (or the removal failed).
    pub fn admit<'a>(&'a self, fleet: &Fleet, candidate: &InstanceId) -> Option<RemovalPermit<'a>> {
        let mut state = self.state.lock();
        if !state.check(fleet, candidate) {
            tracing::debug!(
                instance = %candidate,
                min_available = state.budget.min_available,
                "disruption budget refused removal"
            );
            return None;
        }
        state.pending.insert(candidate.clone());
        Some(RemovalPermit {
            guard: self,
            instance: candidate.clone(),
        })
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl GuardState {
    fn check(&self, fleet: &Fleet, candidate: &InstanceId) -> bool {
        if self.pending.contains(candidate) {
            return false;
        }
        let available_after = fleet
            .iter()
            .filter(|r| r.is_available())
            .filter(|r| r.id() != candidate && !self.pending.contains(r.id()))
            .count() as u32;
        self.budget.allows(available_after)
    }
}

/// An approved removal. Releases its reservation on drop.
#[must_use = "dropping the permit immediately releases the reservation"]
pub struct RemovalPermit<'a> {
    guard: &'a DisruptionGuard,
    instance: InstanceId,
}

impl RemovalPermit<'_> {
    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }
}

impl std::fmt::Debug for RemovalPermit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemovalPermit")
            .field("instance", &self.instance)
            .finish()
    }
}

impl Drop for RemovalPermit<'_> {
    fn drop(&mut self) {
        self.guard.state.lock().pending.remove(&self.instance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::InstanceHealth;
    use crate::rollout::Role;
    use crate::types::{Instance, RevisionId};
    use chrono::Utc;

    fn fleet_with(available: usize, unavailable: usize) -> Fleet {
        let mut fleet = Fleet::new();
        for i in 0..available + unavailable {
            let health = if i < available {
                InstanceHealth::serving()
            } else {
                InstanceHealth::unknown()
            };
            fleet.insert(
                Instance {
                    id: InstanceId::new(format!("i-{i}")),
                    revision: RevisionId::new("v1"),
                    image: "api:v1".into(),
                    created_at: Utc::now(),
                    endpoint: None,
                },
                Role::Old,
                health,
            );
        }
        fleet
    }

    #[test]
    fn refuses_any_candidate_at_the_floor() {
        let fleet = fleet_with(3, 0);
        let guard = DisruptionGuard::new(DisruptionBudget::new(3));
        for record in fleet.iter() {
            assert!(!guard.can_remove(&fleet, record.id()));
        }
    }

    #[test]
    fn approves_exactly_one_candidate_at_a_time() {
        let fleet = fleet_with(4, 0);
        let guard = DisruptionGuard::new(DisruptionBudget::new(3));

        let ids: Vec<_> = fleet.iter().map(|r| r.id().clone()).collect();
        let first = guard.admit(&fleet, &ids[0]).expect("first removal fits the budget");
        for other in &ids[1..] {
            assert!(guard.admit(&fleet, other).is_none());
        }
        assert_eq!(guard.pending(), 1);

        drop(first);
        assert_eq!(guard.pending(), 0);
        assert!(guard.admit(&fleet, &ids[2]).is_some());
    }

    #[test]
    fn unavailable_candidates_cost_nothing() {
        let fleet = fleet_with(3, 1);
        let guard = DisruptionGuard::new(DisruptionBudget::new(3));
        assert!(guard.can_remove(&fleet, &InstanceId::new("i-3")));
        assert!(!guard.can_remove(&fleet, &InstanceId::new("i-0")));
    }

    #[test]
    fn same_candidate_cannot_be_admitted_twice() {
        let fleet = fleet_with(5, 0);
        let guard = DisruptionGuard::new(DisruptionBudget::new(1));
        let id = InstanceId::new("i-0");
        let _permit = guard.admit(&fleet, &id).unwrap();
        assert!(guard.admit(&fleet, &id).is_none());
    }
}
