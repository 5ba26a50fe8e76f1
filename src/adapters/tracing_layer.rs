//! `tracing` layer forwarding events to a dispatcher

use super::LogAdapter;
use crate::core::{is_dispatch_worker, Dispatcher, ErrorInfo, LogEvent, LogLevel, SourceLocation};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

const MESSAGE_FIELD: &str = "message";

/// Layer that sends every enabled event to one dispatcher.
///
/// Event fields become record data; a field recorded as an error becomes the
/// record's error chain.
///
/// # Example
///
/// ```no_run
/// use neurallog::adapters::NeuralLogLayer;
/// use neurallog::prelude::*;
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let registry = LoggerRegistry::http();
/// let layer = NeuralLogLayer::new(registry.get_or_create("api").unwrap());
/// let subscriber = tracing_subscriber::registry().with(layer);
/// tracing::subscriber::set_global_default(subscriber).unwrap();
///
/// tracing::info!(user = "alice", "signed in");
/// ```
pub struct NeuralLogLayer {
    dispatcher: Arc<Dispatcher>,
}

impl NeuralLogLayer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl<S: Subscriber> Layer<S> for NeuralLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // Events raised while a transport sends would loop back into it.
        if is_dispatch_worker() {
            return;
        }
        self.forward(&self.dispatcher, event);
    }
}

impl<'e> LogAdapter<Event<'e>> for NeuralLogLayer {
    fn map_level(&self, event: &Event<'e>) -> LogLevel {
        (*event.metadata().level()).into()
    }

    fn build_event<'a>(&self, event: &'a Event<'e>) -> LogEvent<'a> {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let mut built = LogEvent::new(self.map_level(event), visitor.message.unwrap_or_default())
            .with_logger(metadata.target());

        if !visitor.fields.is_empty() {
            built = built.with_data(visitor.fields);
        }
        if let Some(error) = visitor.error {
            built = built.with_error(error);
        }
        if let Some(file) = metadata.file() {
            let mut location = SourceLocation::new(file, metadata.line().unwrap_or(0));
            if let Some(module) = metadata.module_path() {
                location = location.with_module(module);
            }
            built = built.with_location(location);
        }
        built
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
    error: Option<ErrorInfo>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
        if self.error.is_none() {
            self.error = Some(ErrorInfo::from_dyn(value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, Value::from(format!("{:?}", value)));
        }
    }
}
