//! Groups normalized events by their local calendar date.

use crate::models::{MonthPlan, NormalizedEvent, YearMonth};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Events per local date. Dates without events are absent, never empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateBucketMap {
    buckets: BTreeMap<NaiveDate, Vec<NormalizedEvent>>,
}

impl DateBucketMap {
    pub fn get(&self, date: NaiveDate) -> Option<&[NormalizedEvent]> {
        self.buckets.get(&date).map(Vec::as_slice)
    }

    pub fn has_events(&self, date: NaiveDate) -> bool {
        self.buckets.contains_key(&date)
    }

    /// Drops the dates that fall outside the months of `plan`.
    pub fn retain_months(mut self, plan: &MonthPlan) -> Self {
        self.buckets.retain(|date, _| plan.contains(YearMonth::of(*date)));
        self
    }

    /// Dates in ascending order with their events in source order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[NormalizedEvent])> + '_ {
        self.buckets.iter().map(|(date, events)| (*date, events.as_slice()))
    }

    /// Number of dates with at least one event.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

/// Buckets `events` by `local_date`, keeping their input order within a day.
/// Duplicates coming from the source are kept as separate entries.
pub fn bucketize<I>(events: I) -> DateBucketMap
where
    I: IntoIterator<Item = NormalizedEvent>,
{
    let mut buckets: BTreeMap<NaiveDate, Vec<NormalizedEvent>> = BTreeMap::new();
    for event in events {
        buckets.entry(event.local_date).or_default().push(event);
    }
    DateBucketMap { buckets }
}
