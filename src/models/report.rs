// file: src/report.rs
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub reference_date: NaiveDate,
    pub records_fetched: usize,
    pub events_normalized: usize,
    pub items_skipped: usize,
    pub events_outside_window: usize,
    pub days_with_events: usize,
    pub month_pages: usize,
    pub day_pages: usize,
    pub pages_pruned: usize,
    pub duration: Duration,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            reference_date,
            records_fetched: 0,
            events_normalized: 0,
            items_skipped: 0,
            events_outside_window: 0,
            days_with_events: 0,
            month_pages: 0,
            day_pages: 0,
            pages_pruned: 0,
            duration: Duration::ZERO,
            finished_at: Utc::now(),
        }
    }

    /// Pages written this run, the index included.
    pub fn pages_written(&self) -> usize {
        self.month_pages + self.day_pages + 1
    }
}
