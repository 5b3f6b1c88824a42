use crate::models::decision::TradeLevels;
use crate::models::direction::Direction;

/// Derive stop-relative targets for a new position.
///
/// Returns `None` when the risk per unit is not strictly positive or when the
/// resulting targets are not strictly monotonic in the trade direction.
/// Callers must treat `None` as "do not open".
pub fn compute(
    entry: f64,
    stop: f64,
    direction: Direction,
    multipliers: &[f64; 3],
) -> Option<TradeLevels> {
    let risk = (entry - stop).abs();
    if !risk.is_finite() || risk <= 0.0 {
        tracing::warn!(
            "Rejecting levels: non-positive risk (entry={}, stop={}, direction={})",
            entry,
            stop,
            direction
        );
        return None;
    }

    let targets = multipliers.map(|m| direction.offset(entry, risk * m));

    let mut previous = entry;
    for (idx, target) in targets.iter().enumerate() {
        if !target.is_finite() || !direction.is_beyond(*target, previous) {
            tracing::warn!(
                "Rejecting levels: target {} ({}) not beyond {} for {} (entry={}, stop={}, multipliers={:?})",
                idx + 1,
                target,
                previous,
                direction,
                entry,
                stop,
                multipliers
            );
            return None;
        }
        previous = *target;
    }

    Some(TradeLevels {
        entry,
        stop,
        risk,
        targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn long_scenario_targets() {
        let levels = compute(2000.0, 1950.0, Direction::Long, &[1.4, 1.9, 2.5]).unwrap();
        assert_close(levels.risk, 50.0);
        assert_close(levels.targets[0], 2070.0);
        assert_close(levels.targets[1], 2095.0);
        assert_close(levels.targets[2], 2125.0);
    }

    #[test]
    fn unsorted_multipliers_are_rejected() {
        assert!(compute(2000.0, 1950.0, Direction::Long, &[1.9, 1.4, 2.5]).is_none());
    }

    #[test]
    fn zero_risk_is_rejected() {
        assert!(compute(2000.0, 2000.0, Direction::Long, &[1.4, 1.9, 2.5]).is_none());
        assert!(compute(2000.0, 2000.0, Direction::Short, &[1.4, 1.9, 2.5]).is_none());
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        assert!(compute(f64::NAN, 1950.0, Direction::Long, &[1.4, 1.9, 2.5]).is_none());
        assert!(compute(2000.0, f64::INFINITY, Direction::Long, &[1.4, 1.9, 2.5]).is_none());
    }

    #[test]
    fn short_targets_mirror_long() {
        let levels = compute(2000.0, 2050.0, Direction::Short, &[1.4, 1.9, 2.5]).unwrap();
        assert_close(levels.targets[0], 1930.0);
        assert_close(levels.targets[1], 1905.0);
        assert_close(levels.targets[2], 1875.0);
    }

    proptest! {
        #[test]
        fn targets_strictly_monotonic(
            entry in 1.0..100_000.0_f64,
            distance in 0.01..5_000.0_f64,
            long in any::<bool>(),
            stop_above in any::<bool>(),
        ) {
            let direction = if long { Direction::Long } else { Direction::Short };
            let stop = if stop_above { entry + distance } else { entry - distance };
            let levels = compute(entry, stop, direction, &[1.4, 1.9, 2.5]);
            prop_assert!(levels.is_some());
            let levels = levels.unwrap();
            prop_assert!(direction.is_beyond(levels.targets[0], entry));
            prop_assert!(direction.is_beyond(levels.targets[1], levels.targets[0]));
            prop_assert!(direction.is_beyond(levels.targets[2], levels.targets[1]));
        }

        #[test]
        fn equal_entry_and_stop_is_empty(entry in 1.0..100_000.0_f64, long in any::<bool>()) {
            let direction = if long { Direction::Long } else { Direction::Short };
            prop_assert!(compute(entry, entry, direction, &[1.4, 1.9, 2.5]).is_none());
        }
    }
}
