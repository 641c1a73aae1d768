// micron-calendar - renders a remote calendar into Micron pages
// Main entry point: load configuration, then run the scheduler until Ctrl+C.

use anyhow::Context;
use log::{error, info};
use micron_calendar::calendar::{EventSource, RemoteSource};
use micron_calendar::utils::logging::{init_logging, log_error_with_context};
use micron_calendar::{Config, Pipeline, Scheduler};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging().context("Failed to initialize logging")?;
    info!("Starting micron-calendar {}", env!("CARGO_PKG_VERSION"));

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log_error_with_context(&e, "config");
            return Err(e.into());
        }
    };

    let source = RemoteSource::from_config(&config.source)?;
    info!("Reading events from {}", source.describe());

    let pipeline = Pipeline::new(&config, source)?;
    let mut scheduler = Scheduler::new(pipeline, &config.schedule);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        signal_token.cancel();
    });

    scheduler.run(shutdown).await?;
    info!("micron-calendar stopped");
    Ok(())
}
