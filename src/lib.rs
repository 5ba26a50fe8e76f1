//! # NeuralLog
//!
//! Forwards log events from the logging API an application already uses to a
//! remote NeuralLog ingestion service, without blocking the caller.
//!
//! ## Features
//!
//! - **One record shape**: severities from any framework are mapped onto six
//!   canonical levels; context from every source is merged into one mapping
//! - **Layered configuration**: explicit settings, environment variables,
//!   `.neurallogrc` files and defaults
//! - **Non-blocking dispatch**: bounded queue, bounded worker pool, explicit
//!   overflow policy; transport failures never reach the caller
//! - **Bridges**: `log` facade and `tracing` layer out of the box

pub mod adapters;
pub mod core;
pub mod macros;
pub mod transports;

pub mod prelude {
    pub use crate::adapters::{LogAdapter, NativeRecord, RecordAdapter};
    pub use crate::core::{
        ConfigOverrides, ConfigResolver, ContextGuard, Dispatcher, DispatcherBuilder,
        DispatcherMetrics, DispatcherOptions, EffectiveConfig, ErrorInfo, JsonSerializer,
        LevelMapper, LogContext, LogEvent, LogLevel, LogRecord, LoggerContext, LoggerRegistry,
        Mdc, NeuralLogError, ObjectSerializer, OverflowCallback, OverflowPolicy, Result,
        SendFailureCallback, SharedTransport, SourceLevel, StructuredData, Transport,
        TransportFactory, DEFAULT_SHUTDOWN_TIMEOUT,
    };
}

pub use adapters::{LogAdapter, NativeRecord, RecordAdapter};
pub use core::{
    ConfigOverrides, ConfigResolver, ContextGuard, ContextNormalizer, Dispatcher,
    DispatcherBuilder, DispatcherMetrics, DispatcherOptions, EffectiveConfig, ErrorInfo,
    JsonSerializer, LevelMapper, LogContext, LogEvent, LogLevel, LogRecord, Loggable,
    LoggerContext, LoggerRegistry, Mdc, MdcGuard, NeuralLogError, ObjectSerializer,
    OverflowCallback, OverflowPolicy, Result, SendFailureCallback, SharedTransport, SourceLevel,
    SourceLocation, StructuredData, Transport, TransportFactory, DEFAULT_SHUTDOWN_TIMEOUT,
};
