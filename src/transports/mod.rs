//! Transport implementations

pub mod memory;

#[cfg(feature = "console")]
pub mod console;

#[cfg(feature = "http")]
pub mod http;

pub use memory::{Delivery, MemoryTransport};

#[cfg(feature = "console")]
pub use console::ConsoleTransport;

#[cfg(feature = "http")]
pub use http::{HttpOptions, HttpTransport, HttpTransportFactory, DEFAULT_HTTP_TIMEOUT};

pub use crate::core::{Transport, TransportFactory};
