// file: src/plan.rs
use chrono::{DateTime, Datelike, Month, NaiveDate, Utc};
use std::fmt;

/// A calendar month. `month` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month), "month out of range: {month}");
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    /// The month `k` months after this one.
    pub fn plus_months(self, k: u32) -> Self {
        let offset = self.month - 1 + k;
        Self {
            year: self.year + (offset / 12) as i32,
            month: offset % 12 + 1,
        }
    }

    pub fn next(self) -> Self {
        self.plus_months(1)
    }

    pub fn first_day(self) -> NaiveDate {
        // every (year, month) built through `new` has a first day
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn month_name(self) -> &'static str {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map_or("", |m| m.name())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// The months that get a page this run, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthPlan {
    months: Vec<YearMonth>,
}

impl MonthPlan {
    pub(crate) fn from_months(months: Vec<YearMonth>) -> Self {
        Self { months }
    }

    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn iter(&self) -> std::slice::Iter<'_, YearMonth> {
        self.months.iter()
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn first(&self) -> Option<YearMonth> {
        self.months.first().copied()
    }

    pub fn last(&self) -> Option<YearMonth> {
        self.months.last().copied()
    }

    pub fn contains(&self, month: YearMonth) -> bool {
        self.months.contains(&month)
    }
}

impl<'a> IntoIterator for &'a MonthPlan {
    type Item = &'a YearMonth;
    type IntoIter = std::slice::Iter<'a, YearMonth>;

    fn into_iter(self) -> Self::IntoIter {
        self.months.iter()
    }
}

/// Half-open time range `[start, end)` requested from the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    /// CalDAV `time-range` form, e.g. `20251101T000000Z`.
    pub fn caldav_start(&self) -> String {
        self.start.format("%Y%m%dT%H%M%SZ").to_string()
    }

    pub fn caldav_end(&self) -> String {
        self.end.format("%Y%m%dT%H%M%SZ").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plus_months_wraps_year() {
        let nov = YearMonth::new(2025, 11);
        assert_eq!(nov.plus_months(0), YearMonth::new(2025, 11));
        assert_eq!(nov.plus_months(1), YearMonth::new(2025, 12));
        assert_eq!(nov.plus_months(2), YearMonth::new(2026, 1));
        assert_eq!(nov.plus_months(11), YearMonth::new(2026, 10));
        assert_eq!(YearMonth::new(2025, 12).next(), YearMonth::new(2026, 1));
    }

    #[test]
    fn test_display_and_name() {
        let ym = YearMonth::new(2026, 3);
        assert_eq!(ym.to_string(), "2026-03");
        assert_eq!(ym.month_name(), "March");
        assert_eq!(YearMonth::new(2025, 1).month_name(), "January");
        assert_eq!(YearMonth::new(2025, 12).month_name(), "December");
        assert_eq!(ym.first_day(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert!(ym.contains(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()));
        assert!(!ym.contains(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()));
    }

    #[test]
    fn test_caldav_time_format() {
        let window = FetchWindow {
            start: Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap(),
        };
        assert_eq!(window.caldav_start(), "20251101T000000Z");
        assert_eq!(window.caldav_end(), "20261101T000000Z");
    }
}
