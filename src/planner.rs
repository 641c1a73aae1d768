//! Decides which months get a page and which time window to fetch.

use crate::models::{FetchWindow, MonthPlan, YearMonth};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Number of months rendered per run, the reference month included.
pub const PLAN_MONTHS: u32 = 12;

/// The twelve months starting at the month of `reference`.
///
/// Only the year and month of `reference` are used.
pub fn plan_months(reference: NaiveDate) -> MonthPlan {
    let first = YearMonth::of(reference);
    MonthPlan::from_months((0..PLAN_MONTHS).map(|k| first.plus_months(k)).collect())
}

/// Window covering every planned month: from the first instant of the first
/// month to the first instant of the month after the last one, in `tz`.
pub fn fetch_window(plan: &MonthPlan, tz: Tz) -> Option<FetchWindow> {
    let first = plan.first()?;
    let last = plan.last()?;
    Some(FetchWindow {
        start: start_of_day(first.first_day(), tz),
        end: start_of_day(last.next().first_day(), tz),
    })
}

/// First existing instant of `date` in `tz`, in UTC.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    // zones with a DST jump at midnight have no 00:00 on that day
    (0..=2)
        .find_map(|h| tz.from_local_datetime(&(midnight + Duration::hours(h))).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}
