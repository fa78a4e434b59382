//! Convenience macros for the Keel kernel.
//!
//! This module provides macros useful throughout the kernel for common
//! operations like structured logging.

/// Log an event through the `log` facade under the `keel` target.
///
/// The level is a runtime [`LogLevel`](crate::logging::LogLevel) value, so
/// callers can emit the same event at a configured severity. Optional
/// `key => value` pairs are appended as `key=value` metadata.
///
/// # Examples
///
/// ```
/// use keel_core::log_event;
/// use keel_core::logging::LogLevel;
///
/// // Log an info message
/// log_event!(LogLevel::Info, "kernel facility online");
///
/// // Log a warning with additional context
/// log_event!(LogLevel::Warning, "outstanding allocations at teardown",
///     count => 3,
///     bytes => 4096,
/// );
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:expr, $message:expr $(, $key:ident => $value:expr)* $(,)?) => {
        log::log!(
            target: "keel",
            $crate::logging::LogLevel::to_log_level($level),
            concat!("{}" $(, " ", stringify!($key), "={}")*),
            $message
            $(, $value)*
        )
    };
}

#[cfg(test)]
mod tests {
    use crate::logging::LogLevel;

    #[test]
    fn test_log_event_macro() {
        // These are mostly compile-time tests
        log_event!(LogLevel::Info, "Test message");
        log_event!(LogLevel::Warning, "Test message with fields",
            field1 => "value1",
            field2 => 42,
        );
    }

    #[test]
    fn test_log_event_level_is_dynamic() {
        let level = "warn".parse::<LogLevel>().unwrap();
        log_event!(level, "configured-severity event", source => "test");
    }
}
