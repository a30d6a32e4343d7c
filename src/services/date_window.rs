//! Allocation window evaluation.
//!
//! An experiment's items may be allocated up to and including the experiment
//! date. After that, admins keep access for a short grace period; once the
//! grace period has ended nobody can allocate without an explicit admin
//! override (handled by the view layer, not here).
//!
//! Everything in this module works on calendar dates. Time of day never
//! participates in the comparison.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::errors::{ClientError, ClientResult};

/// Days after the experiment date during which admins may still allocate.
pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 2;

/// Upper bound for a configured grace period.
pub const MAX_GRACE_PERIOD_DAYS: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WindowStatus {
    Valid,
    AdminGrace,
    ExpiredAdminOnly,
    ExpiredCompletely,
}

/// Outcome of evaluating an experiment date against today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    pub allowed: bool,
    pub status: WindowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_overdue: Option<i64>,
    pub message: String,
}

/// Source of "today".
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Clone)]
pub struct DateWindowEvaluator {
    clock: Arc<dyn Clock>,
    grace_period_days: i64,
}

impl fmt::Debug for DateWindowEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateWindowEvaluator")
            .field("today", &self.clock.today())
            .field("grace_period_days", &self.grace_period_days)
            .finish()
    }
}

impl Default for DateWindowEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl DateWindowEvaluator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            grace_period_days: DEFAULT_GRACE_PERIOD_DAYS,
        }
    }

    /// Evaluator pinned to a fixed date, mostly useful for previews and tests.
    pub fn fixed(today: NaiveDate) -> Self {
        Self::new(Arc::new(FixedClock(today)))
    }

    /// Sets the admin grace period, capped at [`MAX_GRACE_PERIOD_DAYS`].
    pub fn with_grace_period(mut self, days: u32) -> Self {
        self.grace_period_days = i64::from(days.min(MAX_GRACE_PERIOD_DAYS));
        self
    }

    pub fn grace_period_days(&self) -> i64 {
        self.grace_period_days
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Evaluates `experiment_date` against the clock's current date.
    pub fn evaluate(&self, experiment_date: NaiveDate, is_admin: bool) -> DateWindow {
        self.evaluate_on(experiment_date, self.clock.today(), is_admin)
    }

    /// Parses a raw date string first; malformed input is an error.
    pub fn evaluate_str(&self, raw: &str, is_admin: bool) -> ClientResult<DateWindow> {
        let date = parse_experiment_date(raw)?;
        Ok(self.evaluate(date, is_admin))
    }

    pub fn evaluate_on(&self, experiment_date: NaiveDate, today: NaiveDate, is_admin: bool) -> DateWindow {
        // Dates at the end of chrono's range saturate instead of overflowing.
        let grace_period_end = experiment_date
            .checked_add_signed(Duration::days(self.grace_period_days))
            .unwrap_or(NaiveDate::MAX);

        if today <= experiment_date {
            let days_remaining = (experiment_date - today).num_days();
            let message = match days_remaining {
                0 => "Experiment is today".to_string(),
                1 => "1 day until the experiment".to_string(),
                n => format!("{} days until the experiment", n),
            };
            return DateWindow {
                allowed: true,
                status: WindowStatus::Valid,
                days_remaining: Some(days_remaining),
                days_overdue: None,
                message,
            };
        }

        let days_overdue = (today - experiment_date).num_days();

        if today <= grace_period_end {
            if is_admin {
                return DateWindow {
                    allowed: true,
                    status: WindowStatus::AdminGrace,
                    days_remaining: None,
                    days_overdue: Some(days_overdue),
                    message: format!(
                        "Experiment was {} day{} ago; admin grace period ends {}",
                        days_overdue,
                        plural(days_overdue),
                        grace_period_end
                    ),
                };
            }
            return DateWindow {
                allowed: false,
                status: WindowStatus::ExpiredAdminOnly,
                days_remaining: None,
                days_overdue: Some(days_overdue),
                message: format!(
                    "Experiment date has passed; only an admin can allocate until {}",
                    grace_period_end
                ),
            };
        }

        DateWindow {
            allowed: false,
            status: WindowStatus::ExpiredCompletely,
            days_remaining: None,
            days_overdue: Some(days_overdue),
            message: format!("Allocation window closed on {}", grace_period_end),
        }
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Parses an experiment date as sent by the API.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS`
/// timestamps. For timestamps the calendar date as written is used; the
/// time and offset are dropped rather than converted.
pub fn parse_experiment_date(raw: &str) -> ClientResult<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidDate("experiment date is empty".to_string()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }

    Err(ClientError::InvalidDate(format!(
        "'{}' is not a recognised date",
        trimmed
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn evaluator() -> DateWindowEvaluator {
        DateWindowEvaluator::fixed(today())
    }

    #[rstest]
    #[case(5, false, WindowStatus::Valid, true)]
    #[case(0, false, WindowStatus::Valid, true)]
    #[case(0, true, WindowStatus::Valid, true)]
    #[case(-1, false, WindowStatus::ExpiredAdminOnly, false)]
    #[case(-1, true, WindowStatus::AdminGrace, true)]
    #[case(-2, false, WindowStatus::ExpiredAdminOnly, false)]
    #[case(-2, true, WindowStatus::AdminGrace, true)]
    #[case(-3, false, WindowStatus::ExpiredCompletely, false)]
    #[case(-3, true, WindowStatus::ExpiredCompletely, false)]
    #[case(-10, true, WindowStatus::ExpiredCompletely, false)]
    fn window_boundaries(
        #[case] offset_days: i64,
        #[case] is_admin: bool,
        #[case] expected: WindowStatus,
        #[case] allowed: bool,
    ) {
        let date = today() + Duration::days(offset_days);
        let window = evaluator().evaluate(date, is_admin);
        assert_eq!(window.status, expected);
        assert_eq!(window.allowed, allowed);
    }

    #[test]
    fn due_today_is_valid_with_zero_days() {
        let window = evaluator().evaluate(today(), false);
        assert_eq!(window.days_remaining, Some(0));
        assert_eq!(window.days_overdue, None);
        assert_eq!(window.message, "Experiment is today");
    }

    #[test]
    fn admin_grace_reports_days_overdue() {
        let window = evaluator().evaluate(today() - Duration::days(1), true);
        assert_eq!(window.days_overdue, Some(1));
        assert_eq!(window.days_remaining, None);
    }

    #[test]
    fn future_date_counts_days_remaining() {
        let window = evaluator().evaluate(today() + Duration::days(3), false);
        assert_eq!(window.days_remaining, Some(3));
        assert_eq!(window.message, "3 days until the experiment");
    }

    #[test]
    fn custom_grace_period_moves_boundary() {
        let evaluator = evaluator().with_grace_period(0);
        let window = evaluator.evaluate(today() - Duration::days(1), true);
        assert_eq!(window.status, WindowStatus::ExpiredCompletely);
    }

    #[test]
    fn grace_period_is_capped() {
        let evaluator = evaluator().with_grace_period(u32::MAX);
        assert_eq!(evaluator.grace_period_days(), i64::from(MAX_GRACE_PERIOD_DAYS));
        let window = evaluator.evaluate(today() - Duration::days(1), true);
        assert_eq!(window.status, WindowStatus::AdminGrace);
        let window = evaluator.evaluate(today() - Duration::days(15), true);
        assert_eq!(window.status, WindowStatus::ExpiredCompletely);
    }

    #[test]
    fn far_future_date_does_not_overflow() {
        let date = parse_experiment_date("+262142-12-31").unwrap();
        let window = evaluator().evaluate(date, false);
        assert_eq!(window.status, WindowStatus::Valid);
        assert!(window.allowed);

        let window = evaluator().evaluate_on(NaiveDate::MAX, NaiveDate::MAX, true);
        assert_eq!(window.days_remaining, Some(0));
        let window = evaluator()
            .with_grace_period(MAX_GRACE_PERIOD_DAYS)
            .evaluate_on(NaiveDate::MAX - Duration::days(1), NaiveDate::MAX, false);
        assert_eq!(window.status, WindowStatus::ExpiredAdminOnly);
    }

    #[rstest]
    #[case("2026-10-19")]
    #[case("2026-10-19T00:00:00.000Z")]
    #[case("2026-10-19T23:30:00+05:30")]
    #[case("2026-10-19T08:15:00")]
    #[case("  2026-10-19 ")]
    fn parses_supported_formats(#[case] raw: &str) {
        assert_eq!(parse_experiment_date(raw).unwrap(), today());
    }

    #[rstest]
    #[case("")]
    #[case("Invalid Date")]
    #[case("2026-13-01")]
    #[case("19/10/2026")]
    fn rejects_malformed_dates(#[case] raw: &str) {
        assert!(matches!(
            parse_experiment_date(raw),
            Err(ClientError::InvalidDate(_))
        ));
    }

    #[test]
    fn evaluate_str_propagates_parse_failure() {
        assert!(evaluator().evaluate_str("NaN", true).is_err());
        let window = evaluator().evaluate_str("2026-10-18", true).unwrap();
        assert_eq!(window.status, WindowStatus::AdminGrace);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(WindowStatus::ExpiredAdminOnly.to_string(), "expired_admin_only");
        let json = serde_json::to_value(WindowStatus::AdminGrace).unwrap();
        assert_eq!(json, "admin_grace");
    }
}
