use super::PageLinks;
use crate::buckets::DateBucketMap;
use crate::models::YearMonth;
use chrono::{Datelike, Duration, NaiveDate};
use std::fmt::Write;

const WEEK_HEADER: &str = "| Mon | Tue | Wed | Thu | Fri | Sat | Sun |\n";
const WEEK_RULE: &str = "|-----|-----|-----|-----|-----|-----|-----|\n";
const BLANK_CELL: &str = "     |";

/// Monthly grid page, Monday-first. Days outside `month` are blank cells and
/// days with events link to their day page.
pub fn render_month(month: YearMonth, buckets: &DateBucketMap, links: &PageLinks) -> String {
    let mut page = String::new();
    let _ = write!(page, "> 📅 {} {}\n\n", month.month_name(), month.year);
    page.push_str(WEEK_HEADER);
    page.push_str(WEEK_RULE);

    for week in month_weeks(month) {
        page.push('|');
        for day in week {
            if !month.contains(day) {
                page.push_str(BLANK_CELL);
                continue;
            }
            if day.day() < 10 {
                page.push(' ');
            }
            if buckets.has_events(day) {
                let _ = write!(page, " `F00a`_`[{}`:{}]`_`f  |", day.day(), links.day(day));
            } else {
                let _ = write!(page, " {}  |", day.day());
            }
        }
        page.push('\n');
    }
    page
}

/// Every Monday-to-Sunday week that overlaps `month`, including the leading
/// and trailing days from the neighbouring months.
pub fn month_weeks(month: YearMonth) -> Vec<[NaiveDate; 7]> {
    let first = month.first_day();
    let last = month.next().first_day() - Duration::days(1);
    let mut monday = first - Duration::days(i64::from(first.weekday().num_days_from_monday()));

    let mut weeks = Vec::new();
    while monday <= last {
        let mut week = [monday; 7];
        for (offset, day) in (0i64..).zip(week.iter_mut()) {
            *day = monday + Duration::days(offset);
        }
        weeks.push(week);
        monday += Duration::days(7);
    }
    weeks
}
