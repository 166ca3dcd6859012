//! Calendar-date and interval utilities.
//!
//! All functions here are total: malformed input produces a documented
//! sentinel (`None`, `0`, an empty iterator), logged at debug level and
//! never escalated. Dates are plain `chrono::NaiveDate` values, so a
//! `YYYY-MM-DD` string always yields exactly that calendar day with no
//! timezone attached and no UTC-midnight day shift.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use tracing::debug;

/// Parse a date string into a plain calendar date.
///
/// `YYYY-MM-DD` is the expected shape; `YYYY/MM/DD` and `MM/DD/YYYY` are
/// accepted as lenient fallbacks, and a datetime string is truncated to its
/// date component. Anything else yields `None`.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Datetime shapes: keep the date component only.
    let date_part = trimmed
        .split_once(['T', ' '])
        .map_or(trimmed, |(date, _)| date);
    let parsed = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y/%m/%d"))
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%m/%d/%Y"));
    match parsed {
        Ok(date) => Some(date),
        Err(_) => {
            debug!(value, "unparseable calendar date");
            None
        }
    }
}

/// Signed whole days from `a` to `b`. Zero when equal, negative when `b`
/// precedes `a`.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// A `YYYY-MM` bucket key for time-series aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Contiguous inclusive sequence of month keys from `start` to `end`,
/// rolling over at year boundaries. Empty when `start > end`.
pub fn month_range(start: MonthKey, end: MonthKey) -> impl Iterator<Item = MonthKey> + Clone {
    let mut current = Some(start).filter(|s| *s <= end);
    std::iter::from_fn(move || {
        let key = current?;
        current = Some(key.next()).filter(|n| *n <= end);
        Some(key)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn iso_date_parses_to_exact_calendar_day() {
        let parsed = parse_calendar_date("2024-03-01").expect("parse");
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 3, 1));
    }

    #[test]
    fn lenient_shapes_fall_back() {
        assert_eq!(parse_calendar_date("2024/03/01"), Some(date(2024, 3, 1)));
        assert_eq!(parse_calendar_date("03/01/2024"), Some(date(2024, 3, 1)));
        assert_eq!(
            parse_calendar_date("2024-03-01T14:22:00"),
            Some(date(2024, 3, 1))
        );
        assert_eq!(
            parse_calendar_date("2024-03-01 14:22"),
            Some(date(2024, 3, 1))
        );
    }

    #[test]
    fn garbage_yields_none() {
        assert_eq!(parse_calendar_date(""), None);
        assert_eq!(parse_calendar_date("   "), None);
        assert_eq!(parse_calendar_date("not a date"), None);
        assert_eq!(parse_calendar_date("2024-13-40"), None);
    }

    #[test]
    fn days_between_signs() {
        let a = date(2024, 1, 1);
        let b = date(2024, 1, 15);
        assert_eq!(days_between(a, a), 0);
        assert_eq!(days_between(a, b), 14);
        assert_eq!(days_between(b, a), -14);
    }

    #[test]
    fn month_range_rolls_over_year() {
        let keys: Vec<String> = month_range(
            MonthKey {
                year: 2023,
                month: 11,
            },
            MonthKey {
                year: 2024,
                month: 2,
            },
        )
        .map(|key| key.to_string())
        .collect();
        assert_eq!(keys, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn month_range_empty_when_reversed() {
        let start = MonthKey {
            year: 2024,
            month: 6,
        };
        let end = MonthKey {
            year: 2024,
            month: 1,
        };
        assert_eq!(month_range(start, end).count(), 0);
    }

    #[test]
    fn month_range_is_restartable() {
        let range = month_range(
            MonthKey {
                year: 2024,
                month: 1,
            },
            MonthKey {
                year: 2024,
                month: 3,
            },
        );
        assert_eq!(range.clone().count(), 3);
        assert_eq!(range.count(), 3);
    }

    proptest! {
        #[test]
        fn days_between_is_antisymmetric(
            a_offset in 0i64..20_000,
            b_offset in 0i64..20_000,
        ) {
            let epoch = date(1990, 1, 1);
            let a = epoch + chrono::Days::new(a_offset as u64);
            let b = epoch + chrono::Days::new(b_offset as u64);
            prop_assert_eq!(days_between(a, b), -days_between(b, a));
            prop_assert_eq!(days_between(a, a), 0);
        }

        #[test]
        fn month_range_is_inclusive_and_contiguous(
            start_year in 2000i32..2030,
            start_month in 1u32..=12,
            span in 0u32..60,
        ) {
            let start = MonthKey { year: start_year, month: start_month };
            let mut end = start;
            for _ in 0..span {
                end = end.next();
            }
            let keys: Vec<MonthKey> = month_range(start, end).collect();
            prop_assert_eq!(keys.len() as u32, span + 1);
            prop_assert_eq!(keys.first().copied(), Some(start));
            prop_assert_eq!(keys.last().copied(), Some(end));
            for pair in keys.windows(2) {
                prop_assert_eq!(pair[0].next(), pair[1]);
            }
        }
    }
}
