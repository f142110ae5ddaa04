// ABOUTME: Replica budgets for a rollout: surge, unavailable, and minimum available.
// ABOUTME: Resolves configured quantities against the desired count and guards removals.

mod guard;

pub use guard::{DisruptionBudget, DisruptionGuard, RemovalPermit};

use serde::Serialize;

use crate::types::{Quantity, Rounding};

/// Budgets resolved to whole instance counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Budgets {
    /// Extra instances allowed above the desired count.
    pub surge: u32,
    /// Desired instances allowed to be unavailable.
    pub unavailable: u32,
    /// Floor the disruption guard enforces on voluntary removals.
    pub min_available: u32,
}

/// Surge rounds up and must leave room for at least one replacement.
/// Anything above the replica count is capped: scale-up stops at `replicas`
/// new instances anyway.
pub fn resolve_surge(replicas: u32, surge: Quantity) -> Result<u32, String> {
    let resolved = surge.resolve(replicas, Rounding::Up);
    if resolved == 0 {
        return Err(format!(
            "max_surge {surge} resolves to 0 instances; at least 1 is needed to replace before removing"
        ));
    }
    Ok(resolved.min(replicas.max(1)))
}

/// Unavailable rounds down and cannot exceed the desired count.
pub fn resolve_unavailable(replicas: u32, unavailable: Quantity) -> Result<u32, String> {
    let resolved = unavailable.resolve(replicas, Rounding::Down);
    if resolved > replicas {
        return Err(format!(
            "max_unavailable {unavailable} resolves to {resolved}, more than {replicas} replicas"
        ));
    }
    Ok(resolved)
}

/// Minimum available rounds up; unset means `replicas - unavailable`.
pub fn resolve_min_available(
    replicas: u32,
    unavailable: u32,
    min_available: Option<Quantity>,
) -> Result<u32, String> {
    let Some(quantity) = min_available else {
        return Ok(replicas.saturating_sub(unavailable));
    };
    let resolved = quantity.resolve(replicas, Rounding::Up);
    if resolved > replicas {
        return Err(format!(
            "min_available {quantity} resolves to {resolved}, more than {replicas} replicas"
        ));
    }
    Ok(resolved)
}

pub fn resolve_budgets(
    replicas: u32,
    max_surge: Quantity,
    max_unavailable: Quantity,
    min_available: Option<Quantity>,
) -> Result<Budgets, String> {
    let surge = resolve_surge(replicas, max_surge)?;
    let unavailable = resolve_unavailable(replicas, max_unavailable)?;
    let min_available = resolve_min_available(replicas, unavailable, min_available)?;
    Ok(Budgets {
        surge,
        unavailable,
        min_available,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_to_one_surge_zero_unavailable() {
        let budgets =
            resolve_budgets(4, Quantity::Absolute(1), Quantity::Absolute(0), None).unwrap();
        assert_eq!(
            budgets,
            Budgets {
                surge: 1,
                unavailable: 0,
                min_available: 4
            }
        );
    }

    #[test]
    fn percentages_round_like_an_orchestrator() {
        let budgets =
            resolve_budgets(10, Quantity::Percent(25), Quantity::Percent(25), None).unwrap();
        assert_eq!(budgets.surge, 3);
        assert_eq!(budgets.unavailable, 2);
        assert_eq!(budgets.min_available, 8);
    }

    #[test]
    fn zero_surge_is_rejected() {
        let err = resolve_surge(4, Quantity::Absolute(0)).unwrap_err();
        assert!(err.contains("max_surge"));
        // 0% of anything is still zero.
        assert!(resolve_surge(4, Quantity::Percent(0)).is_err());
        // 1% of 4 rounds up to one.
        assert_eq!(resolve_surge(4, Quantity::Percent(1)), Ok(1));
    }

    #[test]
    fn surge_above_replicas_is_capped() {
        assert_eq!(resolve_surge(4, Quantity::Absolute(u32::MAX)), Ok(4));
        assert_eq!(resolve_surge(4, Quantity::Percent(u32::MAX)), Ok(4));
        assert_eq!(resolve_surge(4, Quantity::Percent(100)), Ok(4));
    }

    #[test]
    fn unavailable_above_replicas_is_rejected() {
        assert!(resolve_unavailable(3, Quantity::Absolute(4)).is_err());
        assert_eq!(resolve_unavailable(3, Quantity::Percent(200)), Err(
            "max_unavailable 200% resolves to 6, more than 3 replicas".to_string()
        ));
        assert_eq!(resolve_unavailable(3, Quantity::Absolute(3)), Ok(3));
    }

    #[test]
    fn explicit_min_available_overrides_default() {
        assert_eq!(resolve_min_available(4, 1, Some(Quantity::Percent(50))), Ok(2));
        assert_eq!(resolve_min_available(4, 1, None), Ok(3));
        assert!(resolve_min_available(4, 0, Some(Quantity::Absolute(5))).is_err());
    }
}
