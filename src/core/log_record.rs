//! Canonical log record sent to the ingestion service

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use uuid::Uuid;

/// Normalized error detail, one level per link of the error chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub message: String,
    pub type_name: String,
    /// One frame per line; empty when no trace was available.
    pub stack_trace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorInfo>>,
}

impl ErrorInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            type_name: type_name.into(),
            stack_trace: String::new(),
            cause: None,
        }
    }

    /// Attach explicit stack frames, rendered one per line
    #[must_use]
    pub fn with_frames<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stack_trace = frames
            .into_iter()
            .map(|frame| frame.as_ref().trim().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        self
    }

    #[must_use]
    pub fn with_cause(mut self, cause: ErrorInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Normalize a typed error and its `source()` chain.
    ///
    /// The outermost level carries the concrete type name and, when
    /// `RUST_BACKTRACE` enables it, the backtrace of the logging call site.
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        let mut info = Self::from_chain(err, std::any::type_name::<E>().to_string());
        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            info.stack_trace = render_backtrace(&backtrace);
        }
        info
    }

    /// Normalize an error known only as a trait object.
    pub fn from_dyn(err: &(dyn Error + 'static)) -> Self {
        Self::from_chain(err, dyn_type_name(err))
    }

    fn from_chain(err: &(dyn Error + 'static), outer_type: String) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(ErrorInfo::new(dyn_type_name(cause), cause.to_string()));
            source = cause.source();
        }

        // Fold from the innermost cause outwards.
        let cause = causes.into_iter().rev().fold(None, |inner, level: ErrorInfo| {
            Some(match inner {
                Some(inner) => level.with_cause(inner),
                None => level,
            })
        });
        let mut info = ErrorInfo::new(outer_type, err.to_string());
        info.cause = cause.map(Box::new);
        info
    }

    /// Number of levels in the chain, including this one.
    pub fn depth(&self) -> usize {
        1 + self.cause.as_ref().map_or(0, |c| c.depth())
    }
}

/// Best-effort type name for an error behind a trait object.
fn dyn_type_name(err: &(dyn Error + 'static)) -> String {
    if err.downcast_ref::<std::io::Error>().is_some() {
        return "std::io::Error".to_string();
    }
    if err.downcast_ref::<serde_json::Error>().is_some() {
        return "serde_json::Error".to_string();
    }

    let debug = format!("{:?}", err);
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if name.is_empty() {
        "Error".to_string()
    } else {
        name
    }
}

/// Render a backtrace with each frame and its location on one line.
fn render_backtrace(backtrace: &Backtrace) -> String {
    let mut frames: Vec<String> = Vec::new();
    for line in backtrace.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match frames.last_mut() {
            Some(frame) if trimmed.starts_with("at ") => {
                frame.push(' ');
                frame.push_str(trimmed);
            }
            _ => frames.push(trimmed.to_string()),
        }
    }
    frames.join("\n")
}

/// One log event in canonical form.
///
/// Built on the calling thread and moved into the dispatch queue; it is not
/// modified after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(rename = "data", default)]
    pub context: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub log_name: String,
}

impl LogRecord {
    pub fn new(log_name: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            context: Map::new(),
            error: None,
            log_name: log_name.into(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: Option<ErrorInfo>) -> Self {
        self.error = error;
        self
    }
}
