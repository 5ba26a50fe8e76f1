//! Context normalization: merging every source of key-value metadata
//!
//! This module provides:
//! - `LogContext`: builder for explicit per-call fields
//! - `StructuredData`: explicit data as a ready mapping or an arbitrary object
//! - `LoggerContext`: persistent fields shared by every call of a dispatcher
//! - `ContextNormalizer`: the merge of all layers into one flat-ish mapping

use super::serializer::{Loggable, ObjectSerializer};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Reserved key holding the originating logger name
pub const LOGGER_KEY: &str = "logger";
/// Reserved key holding the calling thread's name
pub const THREAD_KEY: &str = "thread";
/// Reserved key holding `{file, line, module}` of the call site
pub const SOURCE_KEY: &str = "source";
/// Key used when an object is represented by a single value
pub const VALUE_KEY: &str = "value";

thread_local! {
    static THREAD_NAME_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Name of the calling thread, falling back to its id; cached per thread
pub fn current_thread_name() -> String {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| {
                let thread = std::thread::current();
                thread
                    .name()
                    .map(String::from)
                    .unwrap_or_else(|| format!("{:?}", thread.id()))
            })
            .clone()
    })
}

/// Builder for explicit per-call fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogContext {
    fields: Map<String, Value>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field to the context
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add a field to the context (mutable version)
    pub fn add_field<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(key.into(), value.into());
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{}", formatted)
    }
}

/// Explicit structured data passed with a log call
pub enum StructuredData<'a> {
    /// Already a mapping; used as-is
    Map(Map<String, Value>),
    /// Any serializable object; converted by the configured serializer
    Object(&'a dyn Loggable),
}

impl fmt::Debug for StructuredData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuredData::Map(map) => f.debug_tuple("Map").field(map).finish(),
            StructuredData::Object(obj) => f.debug_tuple("Object").field(&obj.describe()).finish(),
        }
    }
}

impl From<Map<String, Value>> for StructuredData<'_> {
    fn from(map: Map<String, Value>) -> Self {
        StructuredData::Map(map)
    }
}

impl From<LogContext> for StructuredData<'_> {
    fn from(context: LogContext) -> Self {
        StructuredData::Map(context.into_map())
    }
}

impl From<HashMap<String, Value>> for StructuredData<'_> {
    fn from(map: HashMap<String, Value>) -> Self {
        StructuredData::Map(map.into_iter().collect())
    }
}

/// Call-site location attached under [`SOURCE_KEY`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            module: None,
        }
    }

    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

/// Control metadata added by the normalizer itself.
#[derive(Debug, Clone, Default)]
pub struct DerivedFields {
    pub logger: Option<String>,
    pub thread: Option<String>,
    pub location: Option<SourceLocation>,
}

impl DerivedFields {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn logger(mut self, name: impl Into<String>) -> Self {
        self.logger = Some(name.into());
        self
    }

    #[must_use]
    pub fn thread(mut self, name: impl Into<String>) -> Self {
        self.thread = Some(name.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    fn apply(&self, target: &mut Map<String, Value>) {
        if let Some(logger) = &self.logger {
            target.insert(LOGGER_KEY.to_string(), Value::String(logger.clone()));
        }
        if let Some(thread) = &self.thread {
            target.insert(THREAD_KEY.to_string(), Value::String(thread.clone()));
        }
        if let Some(location) = &self.location {
            if let Ok(value) = serde_json::to_value(location) {
                target.insert(SOURCE_KEY.to_string(), value);
            }
        }
    }
}

/// Persistent fields merged into every record of a dispatcher
///
/// Thread-safe: can be shared across threads and updated while logging.
///
/// # Example
///
/// ```
/// use neurallog::LoggerContext;
///
/// let ctx = LoggerContext::new();
/// ctx.set("service", "api-gateway");
/// ctx.set("version", "1.2.3");
/// assert_eq!(ctx.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoggerContext {
    fields: Arc<RwLock<Map<String, Value>>>,
}

impl LoggerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, overwriting any previous value
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.write().insert(key.into(), value.into());
    }

    /// Replace all fields
    pub fn replace(&self, fields: Map<String, Value>) {
        *self.fields.write() = fields;
    }

    pub fn remove(&self, key: &str) {
        self.fields.write().remove(key);
    }

    pub fn clear(&self) {
        self.fields.write().clear();
    }

    /// Get a clone of all fields
    pub fn get_fields(&self) -> Map<String, Value> {
        self.fields.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    /// Set a field that is removed when the returned guard drops
    #[must_use = "the field is removed as soon as the guard is dropped"]
    pub fn scoped<K, V>(&self, key: K, value: V) -> ContextGuard
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let key = key.into();
        self.fields.write().insert(key.clone(), value.into());
        ContextGuard {
            context: Arc::clone(&self.fields),
            key,
        }
    }

    pub(crate) fn with_fields<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> R {
        f(&self.fields.read())
    }
}

/// RAII guard for a scoped [`LoggerContext`] field
pub struct ContextGuard {
    context: Arc<RwLock<Map<String, Value>>>,
    key: String,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.context.write().remove(&self.key);
    }
}

/// Merges every metadata layer into the context of one record.
///
/// Layers, later overriding earlier on key collision:
/// 1. persistent logger context
/// 2. ambient (MDC) context of the calling thread
/// 3. explicit structured data
/// 4. derived fields (`logger`, `thread`, `source`)
#[derive(Clone)]
pub struct ContextNormalizer {
    serializer: Arc<dyn ObjectSerializer>,
}

impl ContextNormalizer {
    pub fn new(serializer: Arc<dyn ObjectSerializer>) -> Self {
        Self { serializer }
    }

    pub fn normalize(
        &self,
        persistent: &Map<String, Value>,
        ambient: &HashMap<String, String>,
        explicit: Option<StructuredData<'_>>,
        derived: &DerivedFields,
    ) -> Map<String, Value> {
        let mut merged = persistent.clone();

        for (key, value) in ambient {
            merged.insert(key.clone(), Value::String(value.clone()));
        }

        match explicit {
            Some(StructuredData::Map(map)) => merged.extend(map),
            Some(StructuredData::Object(object)) => merged.extend(self.serialize_object(object)),
            None => {}
        }

        derived.apply(&mut merged);
        merged
    }

    /// Convert an object with the configured serializer.
    ///
    /// On failure the object's `Debug` text is kept under [`VALUE_KEY`] so the
    /// log line is never lost.
    pub fn serialize_object(&self, object: &dyn Loggable) -> Map<String, Value> {
        self.serializer.to_map(object).unwrap_or_else(|_| {
            let mut fallback = Map::new();
            fallback.insert(VALUE_KEY.to_string(), Value::String(object.describe()));
            fallback
        })
    }
}

impl fmt::Debug for ContextNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextNormalizer")
            .field("serializer", &self.serializer.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{NeuralLogError, Result};
    use crate::core::serializer::JsonSerializer;
    use serde_json::json;

    fn normalizer() -> ContextNormalizer {
        ContextNormalizer::new(Arc::new(JsonSerializer::new()))
    }

    struct RejectingSerializer;

    impl ObjectSerializer for RejectingSerializer {
        fn to_map(&self, object: &dyn Loggable) -> Result<Map<String, Value>> {
            Err(NeuralLogError::serialization(object.type_name(), "rejected"))
        }

        fn name(&self) -> &str {
            "rejecting"
        }
    }

    #[test]
    fn test_merge_override_order() {
        let mut ambient = HashMap::new();
        ambient.insert("a".to_string(), "1".to_string());
        let explicit = LogContext::new().with_field("a", 2).with_field("b", 3);
        let derived = DerivedFields::new().logger("X");

        let merged = normalizer().normalize(&Map::new(), &ambient, Some(explicit.into()), &derived);

        assert_eq!(Value::Object(merged), json!({"a": 2, "b": 3, "logger": "X"}));
    }

    #[test]
    fn test_derived_fields_win_over_caller_keys() {
        let explicit = LogContext::new()
            .with_field("logger", "spoofed")
            .with_field("thread", "spoofed");
        let derived = DerivedFields::new()
            .logger("svc")
            .thread("worker-1")
            .location(SourceLocation::new("src/main.rs", 10).with_module("app"));

        let merged = normalizer().normalize(&Map::new(), &HashMap::new(), Some(explicit.into()), &derived);

        assert_eq!(merged["logger"], "svc");
        assert_eq!(merged["thread"], "worker-1");
        assert_eq!(merged["source"], json!({"file": "src/main.rs", "line": 10, "module": "app"}));
    }

    #[test]
    fn test_persistent_context_is_lowest_layer() {
        let ctx = LoggerContext::new();
        ctx.set("env", "prod");
        ctx.set("tenant", "default");
        let mut ambient = HashMap::new();
        ambient.insert("tenant".to_string(), "acme".to_string());

        let merged = ctx.with_fields(|fields| {
            normalizer().normalize(fields, &ambient, None, &DerivedFields::new())
        });

        assert_eq!(merged["env"], "prod");
        assert_eq!(merged["tenant"], "acme");
    }

    #[test]
    fn test_object_is_serialized() {
        #[derive(Debug, Serialize)]
        struct Payment {
            amount: u64,
            currency: &'static str,
        }

        let payment = Payment { amount: 120, currency: "EUR" };
        let merged = normalizer().normalize(
            &Map::new(),
            &HashMap::new(),
            Some(StructuredData::Object(&payment)),
            &DerivedFields::new(),
        );

        assert_eq!(Value::Object(merged), json!({"amount": 120, "currency": "EUR"}));
    }

    #[test]
    fn test_serializer_failure_falls_back_to_text() {
        let normalizer = ContextNormalizer::new(Arc::new(RejectingSerializer));
        let merged = normalizer.normalize(
            &Map::new(),
            &HashMap::new(),
            Some(StructuredData::Object(&vec![1, 2])),
            &DerivedFields::new(),
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged["value"], "[1, 2]");
    }

    #[test]
    fn test_context_guard_removes_field() {
        let ctx = LoggerContext::new();
        {
            let _guard = ctx.scoped("request_id", "abc");
            assert_eq!(ctx.len(), 1);
        }
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_log_context_display() {
        let ctx = LogContext::new().with_field("key", "v").with_field("n", 42);
        let formatted = ctx.to_string();
        assert!(formatted.contains("key=\"v\""));
        assert!(formatted.contains("n=42"));
    }

    #[test]
    fn test_current_thread_name_is_cached() {
        let name = std::thread::Builder::new()
            .name("ingest-7".into())
            .spawn(|| (current_thread_name(), current_thread_name()))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(name.0, "ingest-7");
        assert_eq!(name.0, name.1);
    }
}
