// file: src/event.rs
use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Tz;

pub const UNTITLED_EVENT: &str = "Untitled Event";
pub const NO_DESCRIPTION: &str = "No description";

/// One iCalendar document as delivered by an event source.
///
/// A CalDAV server hands out one resource per event series, an ICS export
/// hands out the whole calendar, so a record may hold any number of VEVENTs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventRecord {
    pub href: Option<String>,
    pub data: String,
}

impl RawEventRecord {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            href: None,
            data: data.into(),
        }
    }

    pub fn with_href(href: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            data: data.into(),
        }
    }

    /// Label used in log lines for this record.
    pub fn label(&self) -> &str {
        self.href.as_deref().unwrap_or("<inline>")
    }
}

/// Calendar event in the fixed shape every renderer works with.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: Option<DateTime<Tz>>,
    pub description: String,
    pub local_date: NaiveDate,
}

impl NormalizedEvent {
    /// Builds an event, converting both timestamps into `tz` and filling the
    /// placeholders for missing text fields.
    pub fn new<A: TimeZone, B: TimeZone>(
        title: Option<&str>,
        start: DateTime<A>,
        end: Option<DateTime<B>>,
        description: Option<&str>,
        tz: Tz,
    ) -> Self {
        let start = start.with_timezone(&tz);
        Self {
            title: non_blank(title).unwrap_or(UNTITLED_EVENT).to_string(),
            end: end.map(|end| end.with_timezone(&tz)),
            description: non_blank(description).unwrap_or(NO_DESCRIPTION).to_string(),
            local_date: start.date_naive(),
            start,
        }
    }

    /// True when the event occupies any part of `[from, until)`.
    pub fn overlaps<A: TimeZone>(&self, from: &DateTime<A>, until: &DateTime<A>) -> bool {
        let ends = self.end.as_ref().unwrap_or(&self.start);
        // zero-length events still count when they start inside the window
        if ends == &self.start {
            return self.start >= *from && self.start < *until;
        }
        self.start < *until && *ends > *from
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_placeholders_for_missing_fields() {
        let event = NormalizedEvent::new::<Utc, Utc>(None, at(2025, 11, 15, 9), None, Some("   "), Tz::UTC);

        assert_eq!(event.title, UNTITLED_EVENT);
        assert_eq!(event.description, NO_DESCRIPTION);
        assert!(event.end.is_none());
        assert_eq!(event.local_date, NaiveDate::from_ymd_opt(2025, 11, 15).unwrap());
    }

    #[test]
    fn test_local_date_follows_configured_timezone() {
        // 23:30 UTC on the 14th is already the 15th in Berlin
        let start = Utc.with_ymd_and_hms(2025, 11, 14, 23, 30, 0).unwrap();
        let event = NormalizedEvent::new::<Utc, Utc>(
            Some("Late call"),
            start,
            None,
            None,
            chrono_tz::Europe::Berlin,
        );

        assert_eq!(event.local_date, NaiveDate::from_ymd_opt(2025, 11, 15).unwrap());
        assert_eq!(event.start, start);

        let event = NormalizedEvent::new::<Utc, Utc>(
            Some("Late call"),
            start,
            None,
            None,
            chrono_tz::America::New_York,
        );
        assert_eq!(event.local_date, NaiveDate::from_ymd_opt(2025, 11, 14).unwrap());
    }

    #[test]
    fn test_overlaps_window() {
        let from = at(2025, 11, 1, 0);
        let until = at(2026, 11, 1, 0);

        let inside = NormalizedEvent::new(Some("a"), at(2025, 11, 15, 9), Some(at(2025, 11, 15, 10)), None, Tz::UTC);
        assert!(inside.overlaps(&from, &until));

        let spans_start = NormalizedEvent::new(
            Some("b"),
            from - Duration::days(2),
            Some(from + Duration::hours(1)),
            None,
            Tz::UTC,
        );
        assert!(spans_start.overlaps(&from, &until));

        let before = NormalizedEvent::new(Some("c"), at(2025, 10, 3, 9), Some(at(2025, 10, 3, 10)), None, Tz::UTC);
        assert!(!before.overlaps(&from, &until));

        let at_end = NormalizedEvent::new::<Utc, Utc>(Some("d"), until, None, None, Tz::UTC);
        assert!(!at_end.overlaps(&from, &until));
    }
}
