// Declare modules
pub mod event;
pub mod plan;
pub mod report;

// Re-export so imports like `use crate::models::NormalizedEvent` keep working.
pub use event::{NormalizedEvent, RawEventRecord, NO_DESCRIPTION, UNTITLED_EVENT};
pub use plan::{FetchWindow, MonthPlan, YearMonth};
pub use report::RunReport;
