// ABOUTME: Integration tests for the disruption budget guard.
// ABOUTME: Concurrent removal requests and property checks over budget resolution.

use chrono::Utc;
use proptest::prelude::*;
use rollwatch::budget::{self, DisruptionBudget, DisruptionGuard};
use rollwatch::probe::InstanceHealth;
use rollwatch::rollout::{Fleet, Role};
use rollwatch::types::{Instance, InstanceId, Quantity, RevisionId};
use std::sync::Barrier;
use std::sync::atomic::{AtomicU32, Ordering};

fn instance(n: u32) -> Instance {
    Instance {
        id: InstanceId::new(format!("i-{n}")),
        revision: RevisionId::new("v1"),
        image: "registry.example.com/enrichment-api:v1".to_string(),
        created_at: Utc::now(),
        endpoint: None,
    }
}

fn serving_fleet(available: u32, unavailable: u32) -> Fleet {
    let mut fleet = Fleet::new();
    for n in 0..available {
        fleet.insert(instance(n), Role::Old, InstanceHealth::serving());
    }
    for n in available..available + unavailable {
        fleet.insert(instance(n), Role::New, InstanceHealth::unknown());
    }
    fleet
}

#[test]
fn concurrent_requests_admit_exactly_one() {
    let fleet = serving_fleet(4, 0);
    let guard = DisruptionGuard::new(DisruptionBudget::new(3));
    let admitted = AtomicU32::new(0);
    let barrier = Barrier::new(8);

    std::thread::scope(|scope| {
        for n in 0..8 {
            let (fleet, guard, admitted, barrier) = (&fleet, &guard, &admitted, &barrier);
            scope.spawn(move || {
                let candidate = InstanceId::new(format!("i-{}", n % 4));
                let permit = guard.admit(fleet, &candidate);
                if permit.is_some() {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
                // Every thread decides before any permit is released.
                barrier.wait();
                drop(permit);
            });
        }
    });

    assert_eq!(admitted.load(Ordering::SeqCst), 1);
    assert_eq!(guard.pending(), 0);
}

#[test]
fn released_permit_frees_the_slot() {
    let fleet = serving_fleet(4, 0);
    let guard = DisruptionGuard::new(DisruptionBudget::new(3));

    let first = guard.admit(&fleet, &InstanceId::new("i-0")).unwrap();
    assert!(guard.admit(&fleet, &InstanceId::new("i-1")).is_none());
    drop(first);
    assert!(guard.admit(&fleet, &InstanceId::new("i-1")).is_some());
}

#[test]
fn can_remove_counts_healthy_instances_of_every_revision() {
    let mut fleet = serving_fleet(2, 0);
    let mut ready = InstanceHealth::unknown();
    ready.state = rollwatch::probe::HealthState::Healthy;
    ready.ready = true;
    ready.ever_healthy = true;
    let mut new = instance(9);
    new.revision = RevisionId::new("v2");
    fleet.insert(new, Role::New, ready);

    let guard = DisruptionGuard::new(DisruptionBudget::new(2));
    assert!(guard.can_remove(&fleet, &InstanceId::new("i-0")));
}

proptest! {
    #[test]
    fn guard_never_admits_below_min_available(
        available in 0u32..12,
        unavailable in 0u32..4,
        min_available in 0u32..12,
        requests in proptest::collection::vec(0u32..16, 1..24),
    ) {
        let fleet = serving_fleet(available, unavailable);
        let guard = DisruptionGuard::new(DisruptionBudget::new(min_available));
        let mut held = Vec::new();
        let mut removed_available = 0u32;

        for n in requests {
            let id = InstanceId::new(format!("i-{n}"));
            let Some(record) = fleet.get(&id) else { continue };
            let was_available = record.is_available();
            if let Some(permit) = guard.admit(&fleet, &id) {
                removed_available += u32::from(was_available);
                held.push(permit);
            }
            prop_assert!(
                removed_available == 0 || available - removed_available >= min_available,
                "available {} - removed {} dropped below {}",
                available, removed_available, min_available
            );
        }
    }

    #[test]
    fn resolved_budgets_fit_replica_count(
        replicas in 1u32..200,
        surge_pct in 1u32..=100,
        unavailable_pct in 0u32..=100,
    ) {
        let budgets = budget::resolve_budgets(
            replicas,
            Quantity::Percent(surge_pct),
            Quantity::Percent(unavailable_pct),
            None,
        ).unwrap();
        prop_assert!(budgets.surge >= 1);
        prop_assert!(budgets.unavailable <= replicas);
        prop_assert_eq!(budgets.min_available, replicas - budgets.unavailable);
    }
}
