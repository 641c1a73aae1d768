//! One complete calendar-to-pages run.
//!
//! Stages run strictly in sequence: fetch, normalize, bucketize, render. The
//! only await points are the requests made by the event source. Nothing is
//! written until the fetch has succeeded.

use crate::buckets::{bucketize, DateBucketMap};
use crate::calendar::{normalize_all, EventSource};
use crate::config::{Config, OutputConfig};
use crate::error::{AppError, AppResult};
use crate::models::{MonthPlan, RunReport};
use crate::planner;
use crate::render::{render_day, render_month, IndexPage, PageLinks, RenderContext};
use crate::utils::logging::{log_error_with_context, log_render_summary};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use log::{debug, info};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    Normalizing,
    Bucketizing,
    Planning,
    Rendering,
    Done,
    Failed,
}

pub struct Pipeline<S> {
    source: S,
    tz: Tz,
    output: OutputConfig,
    links: PageLinks,
    state: PipelineState,
}

impl<S: EventSource> Pipeline<S> {
    pub fn new(config: &Config, source: S) -> AppResult<Self> {
        Ok(Self {
            source,
            tz: config.tz()?,
            links: PageLinks::new(&config.output.link_prefix),
            output: config.output.clone(),
            state: PipelineState::Idle,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs the pipeline with today's date in the configured zone as the
    /// reference date.
    pub async fn run_once(&mut self) -> AppResult<RunReport> {
        let today = Utc::now().with_timezone(&self.tz).date_naive();
        self.run_at(today).await
    }

    pub async fn run_at(&mut self, reference: NaiveDate) -> AppResult<RunReport> {
        let started = Instant::now();
        self.state = PipelineState::Idle;

        match self.execute(reference, started).await {
            Ok(report) => {
                self.transition(PipelineState::Done);
                log_render_summary(&report);
                Ok(report)
            }
            Err(e) => {
                self.transition(PipelineState::Failed);
                log_error_with_context(&e, "pipeline");
                Err(e)
            }
        }
    }

    async fn execute(&mut self, reference: NaiveDate, started: Instant) -> AppResult<RunReport> {
        let mut report = RunReport::new(reference);
        let plan = planner::plan_months(reference);
        let window = planner::fetch_window(&plan, self.tz)
            .ok_or_else(|| AppError::from(anyhow::anyhow!("month plan for {reference} is empty")))?;

        self.transition(PipelineState::Fetching);
        info!(
            "Fetching events from {} between {} and {}",
            self.source.describe(),
            window.start,
            window.end
        );
        let records = self.source.fetch(&window).await?;
        report.records_fetched = records.len();

        self.transition(PipelineState::Normalizing);
        let normalized = normalize_all(&records, &window, self.tz);
        report.events_normalized = normalized.events.len();
        report.items_skipped = normalized.skipped;
        let events: Vec<_> = normalized
            .events
            .into_iter()
            .filter(|event| event.overlaps(&window.start, &window.end))
            .collect();
        report.events_outside_window = report.events_normalized - events.len();

        self.transition(PipelineState::Bucketizing);
        let buckets = bucketize(events);

        self.transition(PipelineState::Planning);
        // events running into the window start on a date no month page links to
        let buckets = buckets.retain_months(&plan);
        report.days_with_events = buckets.len();
        debug!(
            "Rendering {} months from {}",
            plan.len(),
            plan.first().map(|m| m.to_string()).unwrap_or_default()
        );

        self.transition(PipelineState::Rendering);
        let mut ctx = RenderContext::new(self.output.root.clone(), self.links.clone());
        render_all(&plan, &buckets, &mut ctx, &mut report)?;
        if self.output.prune_stale {
            report.pages_pruned = ctx.prune_stale()?;
        }

        report.duration = started.elapsed();
        report.finished_at = Utc::now();
        Ok(report)
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Writes the month tables, one page per date with events, then the index.
fn render_all(
    plan: &MonthPlan,
    buckets: &DateBucketMap,
    ctx: &mut RenderContext,
    report: &mut RunReport,
) -> AppResult<()> {
    let mut index = IndexPage::new();

    for month in plan {
        let page = render_month(*month, buckets, ctx.links());
        let path = ctx.month_path(*month);
        ctx.write_page(&path, &page)?;
        index.append_month_link(*month, ctx.links());
        report.month_pages += 1;
    }

    for (date, events) in buckets.iter() {
        let path = ctx.day_path(date);
        ctx.write_page(&path, &render_day(date, events))?;
        report.day_pages += 1;
    }

    let path = ctx.index_path();
    ctx.write_page(&path, index.as_str())?;
    Ok(())
}
