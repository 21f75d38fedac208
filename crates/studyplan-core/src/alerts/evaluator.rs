//! Threshold evaluation.
//!
//! Decides which thresholds a plan has just crossed. Pure: the result depends
//! only on `now`, the plan, the ids already fired and the threshold set.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use super::threshold::{AlertThreshold, ThresholdSet};
use crate::plan::StudyPlan;

/// Thresholds crossed at `now` that have not fired yet.
///
/// A threshold is crossed when `0 < remaining <= lead`. Once the deadline has
/// passed nothing is returned, so a scheduler that was offline across a
/// deadline does not produce a burst of stale alerts. Several thresholds can
/// cross in one call (long pause between ticks); they are all returned in
/// set order, furthest lead time first.
pub fn evaluate(
    now: DateTime<Utc>,
    plan: &StudyPlan,
    prior_fired: &BTreeSet<String>,
    thresholds: &ThresholdSet,
) -> Vec<AlertThreshold> {
    let remaining = plan.remaining(now);
    if remaining <= Duration::zero() {
        return Vec::new();
    }

    thresholds
        .iter()
        .filter(|t| remaining <= t.lead() && !prior_fired.contains(&t.id))
        .cloned()
        .collect()
}

/// Instant at which the next un-fired threshold will cross, if any is still
/// ahead. Thresholds already inside their window report `now`.
pub fn next_due(
    now: DateTime<Utc>,
    plan: &StudyPlan,
    prior_fired: &BTreeSet<String>,
    thresholds: &ThresholdSet,
) -> Option<(DateTime<Utc>, AlertThreshold)> {
    if plan.remaining(now) <= Duration::zero() {
        return None;
    }

    thresholds
        .iter()
        .filter(|t| !prior_fired.contains(&t.id))
        .map(|t| ((plan.exam_deadline - t.lead()).max(now), t.clone()))
        .min_by_key(|(at, _)| *at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn deadline() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap()
    }

    fn plan() -> StudyPlan {
        StudyPlan::new("plan-1", "physics", deadline())
    }

    fn fired(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn ids(result: &[AlertThreshold]) -> Vec<&str> {
        result.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn nothing_outside_the_furthest_window() {
        let now = deadline() - Duration::minutes(70);
        assert!(evaluate(now, &plan(), &fired(&[]), &ThresholdSet::default()).is_empty());
    }

    #[test]
    fn boundary_is_inclusive() {
        let now = deadline() - Duration::minutes(60);
        let result = evaluate(now, &plan(), &fired(&[]), &ThresholdSet::default());
        assert_eq!(ids(&result), vec!["1h"]);
    }

    #[test]
    fn just_outside_boundary_does_not_fire() {
        let now = deadline() - Duration::minutes(60) - Duration::seconds(1);
        assert!(evaluate(now, &plan(), &fired(&[]), &ThresholdSet::default()).is_empty());
    }

    #[test]
    fn already_fired_threshold_is_skipped() {
        let now = deadline() - Duration::minutes(30);
        assert!(evaluate(now, &plan(), &fired(&["1h"]), &ThresholdSet::default()).is_empty());
    }

    #[test]
    fn gap_fires_all_crossed_in_order() {
        let now = deadline() - Duration::minutes(5);
        let result = evaluate(now, &plan(), &fired(&[]), &ThresholdSet::default());
        assert_eq!(ids(&result), vec!["1h", "10m"]);
    }

    #[test]
    fn deadline_instant_fires_nothing() {
        let result = evaluate(deadline(), &plan(), &fired(&[]), &ThresholdSet::default());
        assert!(result.is_empty());
    }

    #[test]
    fn next_due_points_at_furthest_unfired() {
        let now = deadline() - Duration::minutes(70);
        let (at, t) = next_due(now, &plan(), &fired(&[]), &ThresholdSet::default()).unwrap();
        assert_eq!(t.id, "1h");
        assert_eq!(at, deadline() - Duration::minutes(60));

        let (at, t) = next_due(now, &plan(), &fired(&["1h"]), &ThresholdSet::default()).unwrap();
        assert_eq!(t.id, "10m");
        assert_eq!(at, deadline() - Duration::minutes(10));
    }

    #[test]
    fn next_due_is_none_when_all_fired_or_past() {
        let now = deadline() - Duration::minutes(5);
        assert!(next_due(now, &plan(), &fired(&["1h", "10m"]), &ThresholdSet::default()).is_none());
        assert!(next_due(deadline(), &plan(), &fired(&[]), &ThresholdSet::default()).is_none());
    }

    proptest! {
        #[test]
        fn past_deadline_never_fires(
            past_secs in 0i64..10_000_000,
            fired_1h in any::<bool>(),
            fired_10m in any::<bool>(),
        ) {
            let mut prior = BTreeSet::new();
            if fired_1h { prior.insert("1h".to_string()); }
            if fired_10m { prior.insert("10m".to_string()); }
            let now = deadline() + Duration::seconds(past_secs);
            prop_assert!(evaluate(now, &plan(), &prior, &ThresholdSet::default()).is_empty());
        }

        #[test]
        fn evaluate_is_idempotent(offset_secs in -7_200i64..7_200) {
            let now = deadline() - Duration::seconds(offset_secs);
            let prior = fired(&["1h"]);
            let first = evaluate(now, &plan(), &prior, &ThresholdSet::default());
            let second = evaluate(now, &plan(), &prior, &ThresholdSet::default());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn merging_results_never_refires(steps in proptest::collection::vec(0i64..600, 1..40)) {
            // Walk forward from two hours out; each id may only be returned once.
            let mut now = deadline() - Duration::minutes(120);
            let mut prior = BTreeSet::new();
            let mut seen = Vec::new();
            for step in steps {
                now += Duration::seconds(step);
                for t in evaluate(now, &plan(), &prior, &ThresholdSet::default()) {
                    prop_assert!(!prior.contains(&t.id));
                    prior.insert(t.id.clone());
                    seen.push(t.id);
                }
            }
            let unique: BTreeSet<_> = seen.iter().cloned().collect();
            prop_assert_eq!(unique.len(), seen.len());
        }
    }
}
