//! Logging for the secure store
//!
//! Two layers: the [`Logger`] trait injected into
//! [`SecureStore`](crate::store::SecureStore), and a global debug log file
//! the backends write to directly.

mod traits;
pub mod file_logger;

pub use traits::{Logger, NoOpLogger, SharedLogger};
pub use file_logger::FileLogger;

// Re-export file logger functions for convenience
pub use file_logger::{
    log, trace, debug, info, warn, error,
    log_file_path, clear_log, is_enabled, set_enabled, set_min_level, LogLevel,
};
