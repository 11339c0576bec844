//! Calendar math for aligning monthly source segments to day ranges.
//!
//! All arithmetic uses the real (leap-aware) calendar. Source segments
//! cover whole months; requests may start and end mid-month, so the
//! reassembler needs exact month lengths and inclusive day counts.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// A (year, month) key identifying one monthly segment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The month containing a date.
    pub fn of(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    /// First day of the month.
    pub fn first_day(&self) -> NaiveDate {
        // month is always 1-12 for keys built via `of`/`month_span`
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    /// The following month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Number of days in a calendar month (leap-aware).
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(d) => d,
        None => return 0,
    };
    let next = MonthKey::new(year, month).next().first_day();
    (next - first).num_days() as u32
}

/// Months from the one containing `start` to the one containing `end`,
/// inclusive, in chronological order.
pub fn month_span(start: NaiveDate, end: NaiveDate) -> Vec<MonthKey> {
    let mut months = Vec::new();
    let mut key = MonthKey::of(start);
    let last = MonthKey::of(end);
    while key <= last {
        months.push(key);
        key = key.next();
    }
    months
}

/// Inclusive number of calendar days between two dates.
pub fn day_count(start: NaiveDate, end: NaiveDate) -> u64 {
    (end - start).num_days() as u64 + 1
}

/// A validated inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CommonError> {
        if start > end {
            return Err(CommonError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Inclusive day count of the range.
    pub fn days(&self) -> u64 {
        day_count(self.start, self.end)
    }

    /// Months whose segments are required to cover the range.
    pub fn months(&self) -> Vec<MonthKey> {
        month_span(self.start, self.end)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d")
        )
    }
}
