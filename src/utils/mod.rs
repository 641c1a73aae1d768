pub mod logging;

pub use logging::{init_logging, log_error_with_context, log_render_summary};
