//! Logger trait definition

use std::sync::Arc;

/// Logger abstraction used by the secure store façade
///
/// Implementations:
/// - `NoOpLogger`: Silent, what `SecureStore::new` uses
/// - `FileLogger`: Forwards to the global debug log file
///
/// Callers must never hand secret material to a logger.
pub trait Logger: Send + Sync {
    /// Log a debug message
    fn debug(&self, message: &str);

    /// Log an info message
    fn info(&self, message: &str);

    /// Log a warning message
    fn warn(&self, message: &str);

    /// Log an error message
    fn error(&self, message: &str);
}

/// Type alias for an Arc-wrapped logger
pub type SharedLogger = Arc<dyn Logger>;

/// Logger for stores nobody asked to trace
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl NoOpLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for NoOpLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Convenience macros for logging
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(&format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl Logger for Lines {
        fn debug(&self, message: &str) {
            self.0.lock().push(format!("debug {}", message));
        }
        fn info(&self, message: &str) {
            self.0.lock().push(format!("info {}", message));
        }
        fn warn(&self, message: &str) {
            self.0.lock().push(format!("warn {}", message));
        }
        fn error(&self, message: &str) {
            self.0.lock().push(format!("error {}", message));
        }
    }

    #[test]
    fn test_macros_route_by_level() {
        let lines = Arc::new(Lines::default());
        let logger: SharedLogger = lines.clone();

        crate::log_debug!(logger, "set {} in {}", "genericPassword", "someService");
        crate::log_info!(logger, "removed {} accounts", 2);
        crate::log_warn!(logger, "retrying");
        crate::log_error!(logger, "get {} failed: {}", "genericPassword", "denied");

        assert_eq!(
            *lines.0.lock(),
            vec![
                "debug set genericPassword in someService".to_string(),
                "info removed 2 accounts".to_string(),
                "warn retrying".to_string(),
                "error get genericPassword failed: denied".to_string(),
            ]
        );
    }

    #[test]
    fn test_noop_logger_is_shareable() {
        let logger: SharedLogger = Arc::new(NoOpLogger::new());
        crate::log_error!(logger, "dropped {}", "silently");
    }
}
