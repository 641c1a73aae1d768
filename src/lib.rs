// micron-calendar library
// Renders a remote calendar into static Micron pages for NomadNet nodes.

pub mod buckets;
pub mod calendar;
pub mod config;
pub mod error;
pub mod http_config;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod render;
pub mod scheduler;
pub mod utils;

// Re-export commonly used types
pub use buckets::{bucketize, DateBucketMap};
pub use calendar::{EventSource, RemoteSource};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::*;
pub use pipeline::{Pipeline, PipelineState};
pub use scheduler::Scheduler;
