//! Plot lifecycle derivation
//!
//! Maps the time elapsed since planting to a lifecycle status, a progress
//! percentage and an age in months, and decides whether a freshly derived
//! status may overwrite the stored one.

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{PlotLifecycle, PlotStatus};

/// Average length of a month in days
pub const DAYS_PER_MONTH: f64 = 30.44;

/// Derive lifecycle fields from a planting date.
///
/// | age | status | progress |
/// |---|---|---|
/// | < 1 month | planted | 5 |
/// | 1-11 months | growing | min(20 + 5·M, 60) |
/// | 1-3 years | growing | min(60 + 20·(Y−1), 85) |
/// | 3-3.5 years | mature | min(85 + 30·(Y−3), 95) |
/// | ≥ 3.5 years | harvesting | 100 |
///
/// A planting date in the future derives `preparing` with zero progress.
pub fn derive_lifecycle(planted_date: NaiveDate, now: DateTime<Utc>) -> PlotLifecycle {
    let days = now
        .date_naive()
        .signed_duration_since(planted_date)
        .num_days();

    if days < 0 {
        return PlotLifecycle {
            status: PlotStatus::Preparing,
            progress_percentage: 0,
            age_months: Some(0),
        };
    }

    let months = (days as f64 / DAYS_PER_MONTH).round();
    let years = months / 12.0;

    let (status, progress) = if months < 1.0 {
        (PlotStatus::Planted, 5.0)
    } else if months < 12.0 {
        (PlotStatus::Growing, (20.0 + 5.0 * months).min(60.0))
    } else if years < 3.0 {
        (PlotStatus::Growing, (60.0 + 20.0 * (years - 1.0)).min(85.0))
    } else if years < 3.5 {
        (PlotStatus::Mature, (85.0 + 30.0 * (years - 3.0)).min(95.0))
    } else {
        (PlotStatus::Harvesting, 100.0)
    };

    PlotLifecycle {
        status,
        progress_percentage: progress.round() as u8,
        age_months: Some(months as u32),
    }
}

/// Monotonic update policy.
///
/// The derived status wins only if it ranks strictly higher than the stored
/// one, or if the plot is still `preparing` (the first real transition always
/// applies).
pub fn apply_status_if_advances(current: PlotStatus, derived: PlotStatus) -> PlotStatus {
    if current == PlotStatus::Preparing || derived.rank() > current.rank() {
        derived
    } else {
        current
    }
}

/// Merge a derived lifecycle into the stored one under the monotonic policy.
///
/// Age is factual and always refreshed. Progress follows the status: it is
/// only taken from the derivation when the resulting status is the derived
/// one, so a blocked regression keeps its stored progress.
pub fn merge_lifecycle(current: &PlotLifecycle, derived: &PlotLifecycle) -> PlotLifecycle {
    let status = apply_status_if_advances(current.status, derived.status);
    let progress_percentage = if status == derived.status {
        derived.progress_percentage
    } else {
        current.progress_percentage
    };

    PlotLifecycle {
        status,
        progress_percentage,
        age_months: derived.age_months,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn planted_days_ago(days: i64) -> NaiveDate {
        now().date_naive() - Duration::days(days)
    }

    #[test]
    fn test_planted_forty_days_ago_is_growing() {
        let lifecycle = derive_lifecycle(planted_days_ago(40), now());
        assert_eq!(lifecycle.status, PlotStatus::Growing);
        assert_eq!(lifecycle.progress_percentage, 25);
        assert_eq!(lifecycle.age_months, Some(1));
    }

    #[test]
    fn test_fresh_planting() {
        let lifecycle = derive_lifecycle(planted_days_ago(10), now());
        assert_eq!(lifecycle.status, PlotStatus::Planted);
        assert_eq!(lifecycle.progress_percentage, 5);
        assert_eq!(lifecycle.age_months, Some(0));
    }

    #[test]
    fn test_growing_progress_caps_at_sixty_within_first_year() {
        // 11 months: 20 + 55 capped to 60
        let lifecycle = derive_lifecycle(planted_days_ago(335), now());
        assert_eq!(lifecycle.status, PlotStatus::Growing);
        assert_eq!(lifecycle.age_months, Some(11));
        assert_eq!(lifecycle.progress_percentage, 60);
    }

    #[test]
    fn test_second_year_growing() {
        // 24 months → Y = 2 → 60 + 20 = 80
        let lifecycle = derive_lifecycle(planted_days_ago(731), now());
        assert_eq!(lifecycle.status, PlotStatus::Growing);
        assert_eq!(lifecycle.age_months, Some(24));
        assert_eq!(lifecycle.progress_percentage, 80);
    }

    #[test]
    fn test_mature_band() {
        // 39 months → Y = 3.25 → 85 + 7.5 rounds to 93
        let lifecycle = derive_lifecycle(planted_days_ago(1187), now());
        assert_eq!(lifecycle.status, PlotStatus::Mature);
        assert_eq!(lifecycle.age_months, Some(39));
        assert_eq!(lifecycle.progress_percentage, 93);
    }

    #[test]
    fn test_harvesting_after_three_and_a_half_years() {
        let lifecycle = derive_lifecycle(planted_days_ago(1300), now());
        assert_eq!(lifecycle.status, PlotStatus::Harvesting);
        assert_eq!(lifecycle.progress_percentage, 100);
    }

    #[test]
    fn test_future_planting_date_is_preparing() {
        let lifecycle = derive_lifecycle(planted_days_ago(-7), now());
        assert_eq!(lifecycle.status, PlotStatus::Preparing);
        assert_eq!(lifecycle.progress_percentage, 0);
    }

    #[test]
    fn test_status_only_advances() {
        assert_eq!(
            apply_status_if_advances(PlotStatus::Mature, PlotStatus::Growing),
            PlotStatus::Mature
        );
        assert_eq!(
            apply_status_if_advances(PlotStatus::Growing, PlotStatus::Mature),
            PlotStatus::Mature
        );
        assert_eq!(
            apply_status_if_advances(PlotStatus::Growing, PlotStatus::Growing),
            PlotStatus::Growing
        );
    }

    #[test]
    fn test_first_transition_from_preparing_always_applies() {
        assert_eq!(
            apply_status_if_advances(PlotStatus::Preparing, PlotStatus::Planted),
            PlotStatus::Planted
        );
        assert_eq!(
            apply_status_if_advances(PlotStatus::Preparing, PlotStatus::Preparing),
            PlotStatus::Preparing
        );
    }

    #[test]
    fn test_merge_keeps_progress_when_regression_is_blocked() {
        let stored = PlotLifecycle {
            status: PlotStatus::Mature,
            progress_percentage: 90,
            age_months: Some(38),
        };
        let derived = derive_lifecycle(planted_days_ago(200), now());
        assert_eq!(derived.status, PlotStatus::Growing);

        let merged = merge_lifecycle(&stored, &derived);
        assert_eq!(merged.status, PlotStatus::Mature);
        assert_eq!(merged.progress_percentage, 90);
        assert_eq!(merged.age_months, derived.age_months);
    }

    fn status_strategy() -> impl Strategy<Value = PlotStatus> {
        prop_oneof![
            Just(PlotStatus::Preparing),
            Just(PlotStatus::Planted),
            Just(PlotStatus::Growing),
            Just(PlotStatus::Mature),
            Just(PlotStatus::Harvesting),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The stored rank never decreases, whatever order statuses arrive in
        #[test]
        fn prop_status_rank_is_non_decreasing(
            derived in proptest::collection::vec(status_strategy(), 1..30)
        ) {
            let mut current = PlotStatus::Preparing;
            for next in derived {
                let applied = apply_status_if_advances(current, next);
                prop_assert!(applied.rank() >= current.rank());
                current = applied;
            }
        }

        /// Derivation never fails and progress stays within 0-100
        #[test]
        fn prop_progress_is_bounded(days in -400i64..6000i64) {
            let lifecycle = derive_lifecycle(planted_days_ago(days), now());
            prop_assert!(lifecycle.progress_percentage <= 100);
        }

        /// An older planting never derives a lower status than a younger one
        #[test]
        fn prop_derived_status_grows_with_age(days in 0i64..3000i64, extra in 0i64..1000i64) {
            let younger = derive_lifecycle(planted_days_ago(days), now());
            let older = derive_lifecycle(planted_days_ago(days + extra), now());
            prop_assert!(older.status.rank() >= younger.status.rank());
            prop_assert!(older.progress_percentage >= younger.progress_percentage);
        }
    }
}
