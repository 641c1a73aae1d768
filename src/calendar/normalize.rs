//! Turns raw iCalendar documents into [`NormalizedEvent`]s.
//!
//! This is the only place that looks at parser output and the only place
//! that converts between timezones. Recurring series are expanded into their
//! occurrences around the fetch window, honouring EXDATE and RECURRENCE-ID
//! overrides. Broken records and events are logged and skipped; they never
//! abort a run.

use crate::calendar::common;
use crate::error::{AppError, AppResult};
use crate::models::{FetchWindow, NormalizedEvent, RawEventRecord};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use icalendar::parser::{read_calendar, unfold, Calendar as IcsCalendar, Component, Property};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use rrule::RRuleSet;
use std::collections::HashSet;
use std::str::FromStr;

/// Upper bound on occurrences generated for one series.
const MAX_OCCURRENCES: u16 = 5000;

/// Events extracted from one or more records plus the number of items that
/// had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub events: Vec<NormalizedEvent>,
    pub skipped: usize,
}

impl Normalized {
    fn merge(&mut self, other: Normalized) {
        self.events.extend(other.events);
        self.skipped += other.skipped;
    }
}

/// Normalizes every record, in source order.
pub fn normalize_all(records: &[RawEventRecord], window: &FetchWindow, tz: Tz) -> Normalized {
    let mut all = Normalized::default();
    for record in records {
        all.merge(normalize(record, window, tz));
    }
    log::info!(
        "Normalized {} events from {} records ({} skipped)",
        all.events.len(),
        records.len(),
        all.skipped
    );
    all
}

/// Normalizes every VEVENT of one record. Series are expanded for `window`.
pub fn normalize(record: &RawEventRecord, window: &FetchWindow, tz: Tz) -> Normalized {
    let unfolded = unfold(&record.data);
    let calendar = match parse_record(record, &unfolded) {
        Ok(calendar) => calendar,
        Err(e) => {
            log::warn!("Skipping record {}: {}", record.label(), e);
            return Normalized {
                events: Vec::new(),
                skipped: 1,
            };
        }
    };

    let vevents: Vec<&Component<'_>> = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .collect();
    let overridden = overridden_instances(&vevents, tz);

    let mut normalized = Normalized::default();
    for vevent in vevents {
        let converted = match vevent.find_prop("RRULE") {
            Some(rule) if vevent.find_prop("RECURRENCE-ID").is_none() => {
                expand_series(vevent, rule, &overridden, window, tz)
            }
            _ => convert_vevent(vevent, tz).map(|event| vec![event]),
        };
        match converted {
            Ok(events) => {
                for event in &events {
                    log::debug!("Normalized event: {} ({})", event.title, event.start);
                }
                normalized.events.extend(events);
            }
            Err(e) => {
                log::warn!("Skipping event in {}: {}", record.label(), e);
                normalized.skipped += 1;
            }
        }
    }

    if normalized.events.is_empty() && normalized.skipped == 0 {
        log::debug!(
            "Record {} holds no events. First 100 chars: {:?}",
            record.label(),
            record.data.chars().take(100).collect::<String>()
        );
    }
    normalized
}

fn parse_record<'a>(record: &RawEventRecord, unfolded: &'a str) -> AppResult<IcsCalendar<'a>> {
    if !record.data.contains("BEGIN:VCALENDAR") {
        return Err(AppError::parse("record is not an iCalendar document"));
    }
    read_calendar(unfolded).map_err(|e| AppError::parse(format!("Failed to parse ICS data: {e}")))
}

fn convert_vevent(vevent: &Component<'_>, tz: Tz) -> AppResult<NormalizedEvent> {
    let title = text_prop(vevent, "SUMMARY");
    let start = date_prop(vevent, "DTSTART", tz).ok_or_else(|| {
        AppError::parse(format!(
            "event '{}' has no usable DTSTART",
            title.as_deref().unwrap_or("<untitled>")
        ))
    })?;
    let end = date_prop(vevent, "DTEND", tz);
    let description = text_prop(vevent, "DESCRIPTION");

    Ok(NormalizedEvent::new(
        title.as_deref(),
        start,
        end,
        description.as_deref(),
        tz,
    ))
}

/// Occurrences of a recurring master event that can touch `window`.
///
/// Every occurrence keeps the master's length. Occurrences listed in EXDATE
/// or replaced by a RECURRENCE-ID override are left out; the overrides are
/// normalized as events of their own.
fn expand_series(
    vevent: &Component<'_>,
    rule: &Property<'_>,
    overridden: &HashSet<(String, DateTime<Utc>)>,
    window: &FetchWindow,
    tz: Tz,
) -> AppResult<Vec<NormalizedEvent>> {
    let master = convert_vevent(vevent, tz)?;
    let dtstart = vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .ok_or_else(|| AppError::parse(format!("series '{}' has no usable DTSTART", master.title)))?;

    let rule_text = format!("{}\nRRULE:{}", rrule_dtstart(&dtstart, tz), rule.val.as_str());
    let set: RRuleSet = rule_text
        .parse()
        .map_err(|e| AppError::parse(format!("invalid RRULE for '{}': {e}", master.title)))?;

    let length = master.end.map(|end| end - master.start).unwrap_or_else(Duration::zero);
    // widened by a day on both sides; the pipeline applies the exact window
    let utc: rrule::Tz = Utc.into();
    let after = (window.start - length - Duration::days(1)).with_timezone(&utc);
    let before = (window.end + Duration::days(1)).with_timezone(&utc);
    let result = set.after(after).before(before).all(MAX_OCCURRENCES);
    if result.limited {
        log::warn!(
            "Series '{}' stopped after {} occurrences",
            master.title,
            MAX_OCCURRENCES
        );
    }

    let uid = uid_of(vevent);
    let excluded = excluded_instants(vevent, tz);
    let occurrences = result
        .dates
        .iter()
        .map(|occurrence| occurrence.with_timezone(&Utc))
        .filter(|start| !excluded.contains(start) && !overridden.contains(&(uid.clone(), *start)))
        .map(|start| {
            NormalizedEvent::new(
                Some(master.title.as_str()),
                start,
                master.end.map(|_| start + length),
                Some(master.description.as_str()),
                tz,
            )
        })
        .collect::<Vec<_>>();

    log::debug!(
        "Expanded series '{}' into {} occurrences",
        master.title,
        occurrences.len()
    );
    Ok(occurrences)
}

/// DTSTART line for the recurrence engine. Floating and all-day starts recur
/// in the configured zone, as does a TZID the timezone database lacks.
fn rrule_dtstart(start: &DatePerhapsTime, tz: Tz) -> String {
    const LOCAL: &str = "%Y%m%dT%H%M%S";
    match start {
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => {
            format!("DTSTART:{}", dt.format("%Y%m%dT%H%M%SZ"))
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            let zone = Tz::from_str(tzid).map(|zone| zone.name()).unwrap_or(tz.name());
            format!("DTSTART;TZID={zone}:{}", date_time.format(LOCAL))
        }
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            format!("DTSTART;TZID={}:{}", tz.name(), naive.format(LOCAL))
        }
        DatePerhapsTime::Date(date) => {
            format!("DTSTART;TZID={}:{}T000000", tz.name(), date.format("%Y%m%d"))
        }
    }
}

/// `(UID, original start)` of every occurrence replaced by an override.
fn overridden_instances(vevents: &[&Component<'_>], tz: Tz) -> HashSet<(String, DateTime<Utc>)> {
    vevents
        .iter()
        .filter_map(|vevent| {
            let original = date_prop(vevent, "RECURRENCE-ID", tz)?;
            Some((uid_of(vevent), original.with_timezone(&Utc)))
        })
        .collect()
}

/// Instants named by all EXDATE lines, each of which may hold a list.
fn excluded_instants(vevent: &Component<'_>, tz: Tz) -> HashSet<DateTime<Utc>> {
    vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(|prop| {
            prop.val
                .as_str()
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(move |value| {
                    let single = Property {
                        name: prop.name.clone(),
                        val: value.into(),
                        params: prop.params.clone(),
                    };
                    let when = DatePerhapsTime::try_from(&single).ok()?;
                    common::parse_ical_datetime(&when, tz).map(|dt| dt.with_timezone(&Utc))
                })
        })
        .collect()
}

fn date_prop(vevent: &Component<'_>, name: &str, tz: Tz) -> Option<DateTime<Tz>> {
    vevent
        .find_prop(name)
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .and_then(|dt| common::parse_ical_datetime(&dt, tz))
}

fn uid_of(vevent: &Component<'_>) -> String {
    vevent
        .find_prop("UID")
        .map(|p| p.val.as_str().to_string())
        .unwrap_or_default()
}

fn text_prop(vevent: &Component<'_>, name: &str) -> Option<String> {
    vevent.find_prop(name).map(|p| unescape_text(p.val.as_str()))
}

/// Reverses iCalendar TEXT escaping (`\n`, `\,`, `\;`, `\\`).
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NO_DESCRIPTION, UNTITLED_EVENT};
    use chrono::{NaiveDate, TimeZone};

    fn ics(events: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//test//EN\r\n{events}END:VCALENDAR\r\n")
    }

    fn window() -> FetchWindow {
        FetchWindow {
            start: Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap(),
        }
    }

    fn november() -> FetchWindow {
        FetchWindow {
            start: Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap(),
        }
    }

    fn dates_in(normalized: &Normalized, window: &FetchWindow) -> Vec<NaiveDate> {
        let mut dates: Vec<_> = normalized
            .events
            .iter()
            .filter(|e| e.overlaps(&window.start, &window.end))
            .map(|e| e.local_date)
            .collect();
        dates.sort();
        dates
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const STANDUP: &str = "BEGIN:VEVENT\r\nUID:1\r\nSUMMARY:Standup\r\nDTSTART:20251115T090000Z\r\nDTEND:20251115T091500Z\r\nEND:VEVENT\r\n";
    const ALL_DAY: &str = "BEGIN:VEVENT\r\nUID:2\r\nSUMMARY:Holiday\r\nDESCRIPTION:Office closed\r\nDTSTART;VALUE=DATE:20251224\r\nEND:VEVENT\r\n";
    const NO_START: &str = "BEGIN:VEVENT\r\nUID:3\r\nSUMMARY:Broken\r\nEND:VEVENT\r\n";
    const ZONED: &str = "BEGIN:VEVENT\r\nUID:4\r\nDTSTART;TZID=America/New_York:20251114T220000\r\nEND:VEVENT\r\n";
    const WEEKLY: &str = "BEGIN:VEVENT\r\nUID:weekly\r\nSUMMARY:Weekly sync\r\nDTSTART:20240902T090000Z\r\nDTEND:20240902T093000Z\r\nRRULE:FREQ=WEEKLY;BYDAY=MO\r\n";

    #[test]
    fn test_normalize_basic_event() {
        let record = RawEventRecord::new(ics(STANDUP));
        let normalized = normalize(&record, &window(), Tz::UTC);

        assert_eq!(normalized.skipped, 0);
        assert_eq!(normalized.events.len(), 1);
        let event = &normalized.events[0];
        assert_eq!(event.title, "Standup");
        assert_eq!(event.description, NO_DESCRIPTION);
        assert_eq!(event.local_date, date(2025, 11, 15));
        assert_eq!(event.start.format("%H:%M").to_string(), "09:00");
        assert_eq!(event.end.map(|e| e.format("%H:%M").to_string()).as_deref(), Some("09:15"));
    }

    #[test]
    fn test_all_day_event_stays_on_its_date() {
        let record = RawEventRecord::new(ics(ALL_DAY));
        let normalized = normalize(&record, &window(), chrono_tz::Pacific::Auckland);

        let event = &normalized.events[0];
        assert_eq!(event.local_date, date(2025, 12, 24));
        assert_eq!(event.description, "Office closed");
        assert!(event.end.is_none());
    }

    #[test]
    fn test_tzid_is_converted_into_configured_zone() {
        // 22:00 in New York on the 14th is 03:00 UTC on the 15th
        let record = RawEventRecord::new(ics(ZONED));
        let normalized = normalize(&record, &window(), Tz::UTC);

        let event = &normalized.events[0];
        assert_eq!(event.title, UNTITLED_EVENT);
        assert_eq!(event.local_date, date(2025, 11, 15));
    }

    #[test]
    fn test_event_without_start_is_skipped() {
        let record = RawEventRecord::new(ics(&format!("{STANDUP}{NO_START}")));
        let normalized = normalize(&record, &window(), Tz::UTC);

        assert_eq!(normalized.events.len(), 1);
        assert_eq!(normalized.skipped, 1);
    }

    #[test]
    fn test_malformed_record_is_skipped_not_fatal() {
        let records = vec![
            RawEventRecord::with_href("/cal/broken.ics", "this is not a calendar"),
            RawEventRecord::with_href("/cal/ok.ics", ics(STANDUP)),
        ];
        let normalized = normalize_all(&records, &window(), Tz::UTC);

        assert_eq!(normalized.events.len(), 1);
        assert_eq!(normalized.skipped, 1);
        assert_eq!(normalized.events[0].title, "Standup");
    }

    #[test]
    fn test_order_follows_records() {
        let records = vec![
            RawEventRecord::new(ics(ALL_DAY)),
            RawEventRecord::new(ics(STANDUP)),
        ];
        let titles: Vec<_> = normalize_all(&records, &window(), Tz::UTC)
            .events
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Holiday".to_string(), "Standup".to_string()]);
    }

    #[test]
    fn test_text_escapes_are_removed() {
        let record = RawEventRecord::new(ics(
            "BEGIN:VEVENT\r\nUID:5\r\nSUMMARY:Lunch\\, then review\r\nDESCRIPTION:Room 2\\nBring laptop\\; charger\r\nDTSTART:20251115T120000Z\r\nEND:VEVENT\r\n",
        ));
        let event = &normalize(&record, &window(), Tz::UTC).events[0];

        assert_eq!(event.title, "Lunch, then review");
        assert_eq!(event.description, "Room 2\nBring laptop; charger");
    }

    #[test]
    fn test_folded_lines_are_joined() {
        let record = RawEventRecord::new(ics(
            "BEGIN:VEVENT\r\nUID:6\r\nSUMMARY:Quarterly planning with the\r\n  whole team\r\nDTSTART:20251115T120000Z\r\nEND:VEVENT\r\n",
        ));
        assert_eq!(
            normalize(&record, &window(), Tz::UTC).events[0].title,
            "Quarterly planning with the whole team"
        );
    }

    #[test]
    fn test_weekly_series_started_before_window_is_expanded() {
        let record = RawEventRecord::new(ics(&format!("{WEEKLY}END:VEVENT\r\n")));
        let normalized = normalize(&record, &window(), Tz::UTC);

        let dates = dates_in(&normalized, &window());
        // every Monday from 2025-11-03 to 2026-10-26
        assert_eq!(dates.len(), 52);
        assert_eq!(dates[0], date(2025, 11, 3));
        assert_eq!(dates[51], date(2026, 10, 26));
        assert!(dates.contains(&date(2025, 11, 17)));

        let first = normalized.events.iter().find(|e| e.local_date == date(2025, 11, 3)).unwrap();
        assert_eq!(first.title, "Weekly sync");
        assert_eq!(first.start.format("%H:%M").to_string(), "09:00");
        assert_eq!(first.end.map(|e| e.format("%H:%M").to_string()).as_deref(), Some("09:30"));
    }

    #[test]
    fn test_exdates_remove_occurrences() {
        let record = RawEventRecord::new(ics(&format!(
            "{WEEKLY}EXDATE:20251110T090000Z\r\nEXDATE:20251117T090000Z,20251124T090000Z\r\nEND:VEVENT\r\n"
        )));
        let normalized = normalize(&record, &november(), Tz::UTC);

        assert_eq!(dates_in(&normalized, &november()), vec![date(2025, 11, 3)]);
    }

    #[test]
    fn test_override_replaces_its_occurrence() {
        let record = RawEventRecord::new(ics(&format!(
            "{WEEKLY}END:VEVENT\r\nBEGIN:VEVENT\r\nUID:weekly\r\nRECURRENCE-ID:20251117T090000Z\r\nSUMMARY:Weekly sync (moved)\r\nDTSTART:20251118T100000Z\r\nDTEND:20251118T103000Z\r\nEND:VEVENT\r\n"
        )));
        let normalized = normalize(&record, &november(), Tz::UTC);

        assert_eq!(
            dates_in(&normalized, &november()),
            vec![date(2025, 11, 3), date(2025, 11, 10), date(2025, 11, 18), date(2025, 11, 24)]
        );
        let moved = normalized.events.iter().find(|e| e.local_date == date(2025, 11, 18)).unwrap();
        assert_eq!(moved.title, "Weekly sync (moved)");
    }

    #[test]
    fn test_zoned_series_keeps_local_time_across_dst() {
        // Berlin leaves summer time on 2025-10-26
        let record = RawEventRecord::new(ics(
            "BEGIN:VEVENT\r\nUID:7\r\nSUMMARY:Team\r\nDTSTART;TZID=Europe/Berlin:20251020T090000\r\nRRULE:FREQ=WEEKLY;COUNT=4\r\nEND:VEVENT\r\n",
        ));
        let window = FetchWindow {
            start: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap(),
        };
        let normalized = normalize(&record, &window, chrono_tz::Europe::Berlin);

        assert_eq!(normalized.events.len(), 4);
        for event in &normalized.events {
            assert_eq!(event.start.format("%H:%M").to_string(), "09:00");
        }
    }

    #[test]
    fn test_all_day_yearly_series() {
        let record = RawEventRecord::new(ics(
            "BEGIN:VEVENT\r\nUID:8\r\nSUMMARY:New Year\r\nDTSTART;VALUE=DATE:20200101\r\nRRULE:FREQ=YEARLY\r\nEND:VEVENT\r\n",
        ));
        let normalized = normalize(&record, &window(), chrono_tz::Asia::Tokyo);

        assert_eq!(dates_in(&normalized, &window()), vec![date(2026, 1, 1)]);
    }

    #[test]
    fn test_invalid_rrule_skips_the_series() {
        let record = RawEventRecord::new(ics(&format!(
            "{STANDUP}BEGIN:VEVENT\r\nUID:9\r\nSUMMARY:Bad\r\nDTSTART:20251101T090000Z\r\nRRULE:FREQ=SOMETIMES\r\nEND:VEVENT\r\n"
        )));
        let normalized = normalize(&record, &window(), Tz::UTC);

        assert_eq!(normalized.events.len(), 1);
        assert_eq!(normalized.skipped, 1);
    }
}
