// Repeated pipeline runs on a fixed interval until shutdown.

use crate::calendar::EventSource;
use crate::config::ScheduleConfig;
use crate::error::AppResult;
use crate::pipeline::Pipeline;
use log::{error, info};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

pub struct Scheduler<S> {
    pipeline: Pipeline<S>,
    interval: Duration,
    single_pass: bool,
}

impl<S: EventSource> Scheduler<S> {
    pub fn new(pipeline: Pipeline<S>, schedule: &ScheduleConfig) -> Self {
        Self::with_interval(pipeline, schedule.interval(), schedule.run_once)
    }

    pub fn with_interval(pipeline: Pipeline<S>, interval: Duration, single_pass: bool) -> Self {
        Self {
            pipeline,
            interval,
            single_pass,
        }
    }

    /// Runs until `shutdown` fires. Failed runs are logged and the loop goes
    /// on at the normal interval. In single-pass mode the outcome of the one
    /// run is returned instead.
    pub async fn run(&mut self, shutdown: CancellationToken) -> AppResult<()> {
        if self.single_pass {
            info!("Running a single pass");
            return self.pipeline.run_once().await.map(|_| ());
        }

        info!("Starting scheduler, one run every {}s", self.interval.as_secs());

        loop {
            if shutdown.is_cancelled() {
                info!("Shutdown signal received, stopping scheduler");
                break;
            }

            match self.pipeline.run_once().await {
                Ok(report) => info!(
                    "Run for {} finished, next in {}s",
                    report.reference_date,
                    self.interval.as_secs()
                ),
                Err(e) => error!("Run failed: {}; retrying in {}s", e.to_safe_string(), self.interval.as_secs()),
            }

            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received during sleep, stopping scheduler");
                    break;
                }
            }
        }

        info!("Scheduler stopped gracefully");
        Ok(())
    }
}
