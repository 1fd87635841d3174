//! Cron expression parsing and due-window evaluation.
//!
//! Accepts 5-field (`min hour dom mon dow`) and 6-field (`sec min hour dom
//! mon dow`) expressions; 5-field input is normalized by prepending a zero
//! seconds field before parsing.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

/// Parse a 5- or 6-field cron expression into a schedule.
pub fn parse(expr: &str) -> Option<Schedule> {
    let expr = expr.trim();
    let normalized = match expr.split_whitespace().count() {
        5 => format!("0 {expr}"),
        6 => expr.to_string(),
        _ => return None,
    };
    Schedule::from_str(&normalized).ok()
}

/// True iff `expr` is a well-formed 5- or 6-field cron expression.
pub fn validate(expr: &str) -> bool {
    parse(expr).is_some()
}

/// The earliest tick strictly after `from`, or `None` on parse failure.
pub fn next_occurrence(expr: &str, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    parse(expr)?.after(&from).next()
}

/// True iff the next tick after `now` falls within `window` of `now`.
///
/// This is a heuristic for callers that poll on a fixed cadence instead of
/// sleeping until the exact next tick. It can both double-fire across two
/// adjacent polls and, if `window` and the poll cadence are mismatched, miss
/// a tick — callers must apply their own dedup guard.
pub fn is_due_within(expr: &str, now: DateTime<Utc>, window: Duration) -> bool {
    let window = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
    match next_occurrence(expr, now) {
        Some(next) => next - now <= window,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
    }

    #[test]
    fn validate_five_field() {
        assert!(validate("* * * * *"));
        assert!(validate("0 8 * * *"));
        assert!(validate("*/15 9-17 * * Mon-Fri"));
    }

    #[test]
    fn validate_six_field() {
        assert!(validate("0 * * * * *"));
        assert!(validate("30 0 8 * * *"));
    }

    #[test]
    fn validate_rejects_garbage() {
        assert!(!validate("not-a-cron"));
        assert!(!validate(""));
        assert!(!validate("* * *"));
        assert!(!validate("99 * * * *"));
        assert!(!validate("* * * * * * * *"));
    }

    #[test]
    fn next_occurrence_is_strictly_after() {
        let from = at(10, 30, 15);
        let next = next_occurrence("* * * * *", from).unwrap();
        assert!(next > from);
        assert_eq!(next, at(10, 31, 0));
    }

    #[test]
    fn next_occurrence_daily() {
        let from = at(7, 0, 0);
        let next = next_occurrence("0 8 * * *", from).unwrap();
        assert_eq!(next, at(8, 0, 0));
    }

    #[test]
    fn next_occurrence_invalid_is_none() {
        assert!(next_occurrence("bad", at(7, 0, 0)).is_none());
    }

    #[test]
    fn due_within_window() {
        // Next minute tick is 45s away — inside a 60s window, outside a 30s one.
        let now = at(10, 30, 15);
        assert!(is_due_within("* * * * *", now, Duration::from_secs(60)));
        assert!(!is_due_within("* * * * *", now, Duration::from_secs(30)));
    }

    #[test]
    fn due_window_invalid_expr_is_never_due() {
        assert!(!is_due_within("nope", at(10, 0, 0), Duration::from_secs(60)));
    }
}
