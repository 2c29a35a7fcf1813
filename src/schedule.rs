//! Time-of-day windows and the clash rules shared by timetable entries and
//! substitution requests.

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::Serialize;

use crate::errors::{StaffroomError, StaffroomResult};

/// A half-open window `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Build a window, rejecting empty or inverted ranges.
    pub fn new(start: NaiveTime, end: NaiveTime) -> StaffroomResult<Self> {
        if start >= end {
            return Err(StaffroomError::InvalidInput(format!(
                "start_time ({start}) must be before end_time ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Windows that merely touch (one ends when the other starts) do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// ISO day number for a date: Monday is 1, Sunday is 7.
pub fn iso_weekday(date: NaiveDate) -> i64 {
    i64::from(date.weekday().number_from_monday())
}

/// Validate an ISO day number.
pub fn validate_day_of_week(day: i64) -> StaffroomResult<()> {
    if (1..=7).contains(&day) {
        Ok(())
    } else {
        Err(StaffroomError::InvalidInput(format!(
            "day_of_week must be between 1 (Monday) and 7 (Sunday), got {day}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn w(a: (u32, u32), b: (u32, u32)) -> TimeWindow {
        TimeWindow::new(t(a.0, a.1), t(b.0, b.1)).unwrap()
    }

    #[test]
    fn rejects_inverted_and_empty_windows() {
        assert!(TimeWindow::new(t(10, 0), t(9, 0)).is_err());
        assert!(TimeWindow::new(t(10, 0), t(10, 0)).is_err());
    }

    #[test]
    fn adjacent_windows_do_not_overlap() {
        assert!(!w((9, 0), (10, 0)).overlaps(&w((10, 0), (11, 0))));
        assert!(!w((10, 0), (11, 0)).overlaps(&w((9, 0), (10, 0))));
    }

    #[test]
    fn partial_and_nested_windows_overlap() {
        assert!(w((9, 0), (10, 30)).overlaps(&w((10, 0), (11, 0))));
        assert!(w((9, 0), (12, 0)).overlaps(&w((10, 0), (11, 0))));
        assert!(w((10, 0), (11, 0)).overlaps(&w((9, 0), (12, 0))));
    }

    #[test]
    fn weekday_numbers_follow_iso() {
        // 2025-09-01 was a Monday
        let monday = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        assert_eq!(iso_weekday(monday), 1);
        assert_eq!(iso_weekday(monday + chrono::Duration::days(6)), 7);
    }

    #[test]
    fn day_of_week_bounds() {
        assert!(validate_day_of_week(1).is_ok());
        assert!(validate_day_of_week(7).is_ok());
        assert!(validate_day_of_week(0).is_err());
        assert!(validate_day_of_week(8).is_err());
    }
}
