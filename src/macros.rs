//! Logging macros for ergonomic log message formatting.
//!
//! The message is formatted only when the level passes the dispatcher's
//! gate, and the call site is attached under the `source` field.
//!
//! # Examples
//!
//! ```
//! use neurallog::prelude::*;
//! use neurallog::info;
//! use neurallog::transports::MemoryTransport;
//! use std::sync::Arc;
//!
//! let dispatcher = Dispatcher::builder("web", Arc::new(MemoryTransport::new()))
//!     .build()
//!     .unwrap();
//!
//! // Basic logging
//! info!(dispatcher, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(dispatcher, "Server listening on port {}", port);
//! ```

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # use neurallog::prelude::*;
/// # use neurallog::transports::MemoryTransport;
/// # use std::sync::Arc;
/// # let dispatcher = Dispatcher::builder("web", Arc::new(MemoryTransport::new())).build().unwrap();
/// use neurallog::log;
/// log!(dispatcher, LogLevel::Info, "Simple message");
/// log!(dispatcher, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($dispatcher:expr, $level:expr, $($arg:tt)+) => {{
        let level = $level;
        if $dispatcher.is_enabled(level) {
            $dispatcher.dispatch(
                $crate::LogEvent::new(level, format!($($arg)+)).with_location(
                    $crate::SourceLocation::new(file!(), line!()).with_module(module_path!()),
                ),
            );
        }
    }};
}

/// Log a trace-level message.
#[macro_export]
macro_rules! trace {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use neurallog::prelude::*;
/// # use neurallog::transports::MemoryTransport;
/// # use std::sync::Arc;
/// # let dispatcher = Dispatcher::builder("web", Arc::new(MemoryTransport::new())).build().unwrap();
/// use neurallog::info;
/// info!(dispatcher, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! error {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
#[macro_export]
macro_rules! fatal {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Fatal, $($arg)+)
    };
}
