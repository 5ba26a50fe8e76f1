//! Object-to-mapping serialization for structured log data

use super::error::{NeuralLogError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// An arbitrary value that can be attached to a log call.
///
/// Implemented for every `Serialize + Debug` type, so domain objects can be
/// passed directly. The `Debug` text is the fallback when serialization fails.
pub trait Loggable {
    fn to_json(&self) -> std::result::Result<Value, serde_json::Error>;

    fn describe(&self) -> String;

    fn type_name(&self) -> &'static str;
}

impl<T: Serialize + fmt::Debug> Loggable for T {
    fn to_json(&self) -> std::result::Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn describe(&self) -> String {
        format!("{:?}", self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Converts an object into a field mapping.
///
/// Implementations may redact, rename or flatten fields. Errors are recovered
/// by the caller, so implementations should fail rather than guess.
pub trait ObjectSerializer: Send + Sync {
    fn to_map(&self, object: &dyn Loggable) -> Result<Map<String, Value>>;

    fn name(&self) -> &str;
}

/// Default serializer backed by `serde_json`.
///
/// Objects serialize to their fields; scalars and sequences are wrapped under
/// a single `"value"` key.
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer {
    omit_nulls: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop `null` fields (recursively) from serialized objects
    #[must_use]
    pub fn omit_nulls(mut self, omit: bool) -> Self {
        self.omit_nulls = omit;
        self
    }

    fn strip_nulls(value: &mut Value) {
        match value {
            Value::Object(map) => {
                map.retain(|_, v| !v.is_null());
                map.values_mut().for_each(Self::strip_nulls);
            }
            Value::Array(items) => items.iter_mut().for_each(Self::strip_nulls),
            _ => {}
        }
    }
}

impl ObjectSerializer for JsonSerializer {
    fn to_map(&self, object: &dyn Loggable) -> Result<Map<String, Value>> {
        let mut value = object
            .to_json()
            .map_err(|e| NeuralLogError::serialization(object.type_name(), e.to_string()))?;

        if self.omit_nulls {
            Self::strip_nulls(&mut value);
        }

        Ok(match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        })
    }

    fn name(&self) -> &str {
        "json"
    }
}
