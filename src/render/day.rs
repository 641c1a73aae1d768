use crate::models::NormalizedEvent;
use chrono::NaiveDate;
use std::fmt::Write;

pub const NO_END: &str = "No end";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Detail page for one date, listing its events in bucket order.
pub fn render_day(date: NaiveDate, events: &[NormalizedEvent]) -> String {
    let mut page = String::new();
    let _ = write!(page, "> Events for {date}\n\n");

    for event in events {
        let end = event
            .end
            .as_ref()
            .map(|end| end.format(TIME_FORMAT).to_string())
            .unwrap_or_else(|| NO_END.to_string());

        let _ = writeln!(page, ">> {}", event.title);
        let _ = writeln!(page, ">>> `!Start:`! {}", event.start.format(TIME_FORMAT));
        let _ = writeln!(page, ">>> `!End:`! {end}");
        let _ = writeln!(page, ">>> `!Description:`! ");
        let _ = writeln!(page, "{}", event.description);
    }
    page
}
