//! Core types: levels, records, configuration and dispatch

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod level_mapper;
pub mod log_level;
pub mod log_record;
pub mod mdc;
pub mod metrics;
pub mod overflow_policy;
pub mod registry;
pub mod serializer;
pub mod transport;

#[cfg(feature = "async-transports")]
pub mod async_transport;

pub use config::{
    parse_candidate, ConfigOverrides, ConfigResolver, ConfigSource, EffectiveConfig, EnvSource,
    Environment, FileSource, PartialConfig, CONFIG_FILE_NAMES, DEFAULT_NAMESPACE,
    DEFAULT_SERVER_URL, ENV_NAMESPACE, ENV_SERVER_URL,
};
pub use context::{
    current_thread_name, ContextGuard, ContextNormalizer, DerivedFields, LogContext,
    LoggerContext, SourceLocation, StructuredData, LOGGER_KEY, SOURCE_KEY, THREAD_KEY, VALUE_KEY,
};
pub use dispatcher::{
    is_dispatch_worker, Dispatcher, DispatcherBuilder, DispatcherOptions, LogEvent,
    DEFAULT_BATCH_LINGER, DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT,
    DEFAULT_WORKERS,
};
pub use error::{NeuralLogError, Result};
pub use level_mapper::{LevelMapper, SourceLevel};
pub use log_level::LogLevel;
pub use log_record::{ErrorInfo, LogRecord};
pub use mdc::{Mdc, MdcGuard};
pub use metrics::DispatcherMetrics;
pub use overflow_policy::{stderr_send_failure, OverflowCallback, OverflowPolicy, SendFailureCallback};
pub use registry::LoggerRegistry;
pub use serializer::{JsonSerializer, Loggable, ObjectSerializer};
pub use transport::{SharedTransport, Transport, TransportFactory};

#[cfg(feature = "async-transports")]
pub use async_transport::{AsyncTransport, BlockingTransport};
