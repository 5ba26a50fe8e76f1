//! Bridge from the `log` facade

use super::LogAdapter;
use crate::core::{
    is_dispatch_worker, Dispatcher, LogEvent, LogLevel, NeuralLogError, Result, SourceLocation,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
use log::{LevelFilter, Metadata, Record};
use std::sync::Arc;

/// Forwards `log` records to one dispatcher; the record target becomes the
/// `logger` field.
///
/// # Example
///
/// ```no_run
/// use neurallog::adapters::LogBridge;
/// use neurallog::prelude::*;
///
/// let registry = LoggerRegistry::http();
/// LogBridge::init(registry.get_or_create("my-application").unwrap()).unwrap();
///
/// log::info!("forwarded to NeuralLog");
/// ```
pub struct LogBridge {
    dispatcher: Arc<Dispatcher>,
}

impl LogBridge {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Install as the global `log` logger, with the max level taken from the
    /// dispatcher threshold
    pub fn init(dispatcher: Arc<Dispatcher>) -> Result<()> {
        let max_level = Self::level_filter(dispatcher.level());
        log::set_boxed_logger(Box::new(Self::new(dispatcher)))
            .map_err(|e| NeuralLogError::config("LogBridge", e.to_string()))?;
        log::set_max_level(max_level);
        Ok(())
    }

    pub fn level_filter(threshold: LogLevel) -> LevelFilter {
        match threshold {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error | LogLevel::Fatal => LevelFilter::Error,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl<'r> LogAdapter<Record<'r>> for LogBridge {
    fn map_level(&self, event: &Record<'r>) -> LogLevel {
        event.level().into()
    }

    fn build_event<'a>(&self, event: &'a Record<'r>) -> LogEvent<'a> {
        let built = LogEvent::new(self.map_level(event), event.args().to_string())
            .with_logger(event.target());

        match event.file() {
            Some(file) => {
                let mut location = SourceLocation::new(file, event.line().unwrap_or(0));
                if let Some(module) = event.module_path() {
                    location = location.with_module(module);
                }
                built.with_location(location)
            }
            None => built,
        }
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // Records from worker threads come from the transport itself.
        !is_dispatch_worker() && self.dispatcher.is_enabled(metadata.level().into())
    }

    fn log(&self, record: &Record) {
        if is_dispatch_worker() {
            return;
        }
        self.forward(&self.dispatcher, record);
    }

    fn flush(&self) {
        self.dispatcher.flush(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}
