//! Adapter for records produced by foreign logging frameworks
//!
//! Used when events arrive already decoded, for example from a sidecar that
//! receives JUL, Logback or syslog output and only knows each framework's
//! native severity number.

use super::LogAdapter;
use crate::core::{ErrorInfo, LevelMapper, LogEvent, LogLevel, SourceLevel, SourceLocation};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A log event in the terms of its source framework
#[derive(Debug, Clone, PartialEq)]
pub struct NativeRecord {
    pub logger: String,
    pub level: SourceLevel,
    pub message: String,
    pub thread: Option<String>,
    pub fields: Map<String, Value>,
    /// Diagnostic context captured by the source; replaces the local MDC
    pub mdc: Option<HashMap<String, String>>,
    pub error: Option<ErrorInfo>,
    pub location: Option<SourceLocation>,
}

impl NativeRecord {
    pub fn new(logger: impl Into<String>, level: impl Into<SourceLevel>, message: impl Into<String>) -> Self {
        Self {
            logger: logger.into(),
            level: level.into(),
            message: message.into(),
            thread: None,
            fields: Map::new(),
            mdc: None,
            error: None,
            location: None,
        }
    }

    #[must_use]
    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = Some(thread.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_mdc(mut self, mdc: HashMap<String, String>) -> Self {
        self.mdc = Some(mdc);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// Maps [`NativeRecord`]s through [`LevelMapper`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordAdapter;

impl LogAdapter<NativeRecord> for RecordAdapter {
    fn map_level(&self, event: &NativeRecord) -> LogLevel {
        LevelMapper::map(&event.level)
    }

    fn build_event<'a>(&self, event: &'a NativeRecord) -> LogEvent<'a> {
        let mut built = LogEvent::new(self.map_level(event), event.message.clone())
            .with_logger(event.logger.clone());

        if !event.fields.is_empty() {
            built = built.with_data(event.fields.clone());
        }
        if let Some(mdc) = &event.mdc {
            built = built.with_ambient(mdc.clone());
        }
        if let Some(thread) = &event.thread {
            built = built.with_thread(thread.clone());
        }
        if let Some(error) = &event.error {
            built = built.with_error(error.clone());
        }
        if let Some(location) = &event.location {
            built = built.with_location(location.clone());
        }
        built
    }
}
