//! Expiration-date resolution.
//!
//! Monthly equity options expire on the third Friday of the month. The
//! resolver turns a symbolic spec (or an explicit `YYYY-MM-DD`) into a concrete
//! date relative to a caller-supplied `today`; it never reads the clock itself.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::ChainError;

/// Symbolic expiration tokens accepted by [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationToken {
    /// Third Friday of `today`'s month, even if already past.
    CurrentMonthThirdFriday,
    /// Third Friday of the month after `today`'s month.
    NextMonthThirdFriday,
    /// Current month's third Friday before the 15th, next month's from the 15th on.
    NextMonthly,
}

impl ExpirationToken {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "current_month_third_friday" => Some(ExpirationToken::CurrentMonthThirdFriday),
            "next_month_third_friday" => Some(ExpirationToken::NextMonthThirdFriday),
            "next_monthly" => Some(ExpirationToken::NextMonthly),
            _ => None,
        }
    }
}

/// Resolve an expiration spec against `today`.
pub fn resolve(spec: &str, today: NaiveDate) -> Result<NaiveDate, ChainError> {
    if let Some(token) = ExpirationToken::parse(spec) {
        let (year, month) = match token {
            ExpirationToken::CurrentMonthThirdFriday => (today.year(), today.month()),
            ExpirationToken::NextMonthThirdFriday => next_month(today.year(), today.month()),
            ExpirationToken::NextMonthly if today.day() >= 15 => {
                next_month(today.year(), today.month())
            }
            ExpirationToken::NextMonthly => (today.year(), today.month()),
        };
        return third_friday(year, month).ok_or_else(|| invalid(spec));
    }

    NaiveDate::parse_from_str(spec.trim(), "%Y-%m-%d").map_err(|_| invalid(spec))
}

/// Third Friday of the given month: first Friday plus 14 days.
pub fn third_friday(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (Weekday::Fri.num_days_from_monday() + 7
        - first.weekday().num_days_from_monday())
        % 7;
    Some(first + Duration::days(offset as i64 + 14))
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 { (year + 1, 1) } else { (year, month + 1) }
}

fn invalid(spec: &str) -> ChainError {
    ChainError::InvalidExpirationSpec {
        spec: spec.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_current_month_third_friday() {
        assert_eq!(
            resolve("current_month_third_friday", d(2026, 2, 10)).unwrap(),
            d(2026, 2, 20)
        );
        // Already elapsed this month, still this month's date
        assert_eq!(
            resolve("current_month_third_friday", d(2026, 2, 27)).unwrap(),
            d(2026, 2, 20)
        );
    }

    #[test]
    fn test_next_month_from_expiration_day() {
        assert_eq!(
            resolve("next_month_third_friday", d(2026, 2, 20)).unwrap(),
            d(2026, 3, 20)
        );
    }

    #[test]
    fn test_month_starting_on_friday() {
        // 2026-05-01 is a Friday: first Friday is the 1st, not the 8th
        assert_eq!(third_friday(2026, 5), Some(d(2026, 5, 15)));
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        assert_eq!(
            resolve("next_month_third_friday", d(2026, 12, 5)).unwrap(),
            d(2027, 1, 15)
        );
    }

    #[test]
    fn test_next_monthly_switches_mid_month() {
        assert_eq!(resolve("next_monthly", d(2026, 2, 14)).unwrap(), d(2026, 2, 20));
        assert_eq!(resolve("next_monthly", d(2026, 2, 15)).unwrap(), d(2026, 3, 20));
        assert_eq!(resolve("NEXT_MONTHLY", d(2026, 12, 20)).unwrap(), d(2027, 1, 15));
    }

    #[test]
    fn test_explicit_date() {
        assert_eq!(resolve("2026-06-18", d(2026, 2, 10)).unwrap(), d(2026, 6, 18));
    }

    #[test]
    fn test_rejects_garbage() {
        for spec in ["", "next_friday", "2026-13-01", "20260220"] {
            let err = resolve(spec, d(2026, 2, 10)).unwrap_err();
            assert!(matches!(err, ChainError::InvalidExpirationSpec { .. }), "{spec}");
        }
    }

    #[test]
    fn test_third_friday_is_always_friday_in_range() {
        for year in 2024..=2030 {
            for month in 1..=12 {
                let date = third_friday(year, month).unwrap();
                assert_eq!(date.weekday(), Weekday::Fri);
                assert!((15..=21).contains(&date.day()));
            }
        }
    }
}
