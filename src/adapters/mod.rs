//! Framework shims
//!
//! Every shim implements [`LogAdapter`] for the native event type of its
//! framework: how to read the severity, and how to turn the event into a
//! [`LogEvent`]. Gating and dispatch are shared.

pub mod record;

#[cfg(feature = "log-bridge")]
pub mod log_bridge;

#[cfg(feature = "tracing-bridge")]
pub mod tracing_layer;

use crate::core::{is_dispatch_worker, Dispatcher, LogEvent, LogLevel};

pub use record::{NativeRecord, RecordAdapter};

#[cfg(feature = "log-bridge")]
pub use log_bridge::LogBridge;

#[cfg(feature = "tracing-bridge")]
pub use tracing_layer::NeuralLogLayer;

/// Conversion of one framework's native events
pub trait LogAdapter<E> {
    fn map_level(&self, event: &E) -> LogLevel;

    fn build_event<'a>(&self, event: &'a E) -> LogEvent<'a>;

    /// Gate on the mapped level, then hand the event to `dispatcher`
    fn forward(&self, dispatcher: &Dispatcher, event: &E) {
        if !is_dispatch_worker() && dispatcher.is_enabled(self.map_level(event)) {
            dispatcher.dispatch(self.build_event(event));
        }
    }
}
