//! Property-based tests for allocation window evaluation.
//!
//! Experiment dates and "today" are drawn from a few years around 2026 so
//! every offset inside and around the grace period gets exercised.

use chrono::{Duration, NaiveDate};
use labflow::services::{
    parse_experiment_date, present, DateWindowEvaluator, UrgencyTier, WindowStatus,
    DEFAULT_GRACE_PERIOD_DAYS,
};
use proptest::prelude::*;

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..3 * 365).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(offset)
    })
}

fn offset_strategy() -> impl Strategy<Value = i64> {
    -30i64..30
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn future_or_today_is_always_valid(
        today in date_strategy(),
        ahead in 0i64..400,
        admin in any::<bool>(),
    ) {
        let window = DateWindowEvaluator::fixed(today)
            .evaluate(today + Duration::days(ahead), admin);
        prop_assert!(window.allowed);
        prop_assert_eq!(window.status, WindowStatus::Valid);
        prop_assert_eq!(window.days_remaining, Some(ahead));
        prop_assert_eq!(window.days_overdue, None);
    }

    #[test]
    fn admin_access_is_a_superset_of_everyone_elses(
        today in date_strategy(),
        offset in offset_strategy(),
    ) {
        let evaluator = DateWindowEvaluator::fixed(today);
        let date = today + Duration::days(offset);
        let admin = evaluator.evaluate(date, true);
        let other = evaluator.evaluate(date, false);
        prop_assert!(admin.allowed || !other.allowed);
    }

    #[test]
    fn grace_period_boundaries(today in date_strategy(), overdue in 1i64..30) {
        let evaluator = DateWindowEvaluator::fixed(today);
        let date = today - Duration::days(overdue);
        let admin = evaluator.evaluate(date, true);
        let other = evaluator.evaluate(date, false);

        prop_assert_eq!(admin.days_overdue, Some(overdue));
        prop_assert!(!other.allowed);
        if overdue <= DEFAULT_GRACE_PERIOD_DAYS {
            prop_assert_eq!(admin.status, WindowStatus::AdminGrace);
            prop_assert!(admin.allowed);
            prop_assert_eq!(other.status, WindowStatus::ExpiredAdminOnly);
        } else {
            prop_assert_eq!(admin.status, WindowStatus::ExpiredCompletely);
            prop_assert!(!admin.allowed);
            prop_assert_eq!(other.status, WindowStatus::ExpiredCompletely);
        }
    }

    #[test]
    fn evaluation_is_idempotent(
        today in date_strategy(),
        offset in offset_strategy(),
        admin in any::<bool>(),
    ) {
        let evaluator = DateWindowEvaluator::fixed(today);
        let date = today + Duration::days(offset);
        prop_assert_eq!(evaluator.evaluate(date, admin), evaluator.evaluate(date, admin));
    }

    #[test]
    fn date_only_and_timestamp_agree(
        today in date_strategy(),
        date in date_strategy(),
        hour in 0u32..24,
        admin in any::<bool>(),
    ) {
        let evaluator = DateWindowEvaluator::fixed(today);
        let plain = date.format("%Y-%m-%d").to_string();
        let stamped = format!("{}T{:02}:30:00Z", plain, hour);
        prop_assert_eq!(
            evaluator.evaluate_str(&plain, admin).unwrap(),
            evaluator.evaluate_str(&stamped, admin).unwrap()
        );
    }

    #[test]
    fn allowed_windows_never_present_as_blocked(
        today in date_strategy(),
        offset in offset_strategy(),
        admin in any::<bool>(),
    ) {
        let window = DateWindowEvaluator::fixed(today)
            .evaluate(today + Duration::days(offset), admin);
        let tier = present(&window).tier;
        if window.allowed {
            prop_assert!(tier != UrgencyTier::Blocked && tier != UrgencyTier::AdminRequired);
        } else {
            prop_assert!(tier == UrgencyTier::Blocked || tier == UrgencyTier::AdminRequired);
        }
    }

    #[test]
    fn garbage_dates_are_rejected(raw in "[a-zA-Z ]{0,20}") {
        prop_assert!(parse_experiment_date(&raw).is_err());
    }
}

#[test]
fn custom_grace_period_extends_admin_window() {
    let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    let evaluator = DateWindowEvaluator::fixed(today).with_grace_period(5);
    let window = evaluator.evaluate(today - Duration::days(5), true);
    assert_eq!(window.status, WindowStatus::AdminGrace);
    let window = evaluator.evaluate(today - Duration::days(6), true);
    assert_eq!(window.status, WindowStatus::ExpiredCompletely);
}
