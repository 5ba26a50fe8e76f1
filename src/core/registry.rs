//! Registry of shared dispatchers, one per log name
//!
//! The registry is an ordinary value: construct one at startup and hand it
//! (usually inside an `Arc`) to every framework shim that needs a dispatcher.

use super::{
    config::{ConfigResolver, EffectiveConfig},
    context::LoggerContext,
    dispatcher::{Dispatcher, DispatcherOptions},
    error::Result,
    transport::TransportFactory,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maps log names to dispatchers; first registration wins.
///
/// # Example
///
/// ```
/// use neurallog::prelude::*;
/// use neurallog::transports::MemoryTransport;
/// use std::sync::Arc;
///
/// let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
/// let registry = LoggerRegistry::with_config(
///     SharedTransport(transport),
///     EffectiveConfig::builder().namespace("checkout").build(),
/// );
///
/// let a = registry.get_or_create("payments").unwrap();
/// let b = registry.get_or_create("payments").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub struct LoggerRegistry {
    factory: Arc<dyn TransportFactory>,
    resolver: ConfigResolver,
    config: RwLock<Arc<EffectiveConfig>>,
    options: DispatcherOptions,
    dispatchers: RwLock<HashMap<String, Arc<Dispatcher>>>,
    global_context: LoggerContext,
}

impl LoggerRegistry {
    /// Registry whose default configuration comes from files and environment
    pub fn new(factory: impl TransportFactory + 'static) -> Self {
        Self::with_resolver(factory, ConfigResolver::new())
    }

    pub fn with_resolver(factory: impl TransportFactory + 'static, resolver: ConfigResolver) -> Self {
        let config = resolver.resolve(None);
        Self::build(Arc::new(factory), resolver, config)
    }

    /// Registry with a fixed default configuration
    pub fn with_config(factory: impl TransportFactory + 'static, config: EffectiveConfig) -> Self {
        Self::build(Arc::new(factory), ConfigResolver::new(), config)
    }

    fn build(factory: Arc<dyn TransportFactory>, resolver: ConfigResolver, config: EffectiveConfig) -> Self {
        Self {
            factory,
            resolver,
            config: RwLock::new(Arc::new(config)),
            options: DispatcherOptions::default(),
            dispatchers: RwLock::new(HashMap::new()),
            global_context: LoggerContext::new(),
        }
    }

    /// Queue and worker settings for dispatchers created from now on
    #[must_use = "builder methods return a new value"]
    pub fn options(mut self, options: DispatcherOptions) -> Self {
        self.options = options;
        self
    }

    /// Shared dispatcher for `log_name`, created on first request.
    ///
    /// Concurrent first requests construct exactly one dispatcher.
    pub fn get_or_create(&self, log_name: &str) -> Result<Arc<Dispatcher>> {
        if let Some(dispatcher) = self.dispatchers.read().get(log_name) {
            return Ok(Arc::clone(dispatcher));
        }

        let mut dispatchers = self.dispatchers.write();
        if let Some(dispatcher) = dispatchers.get(log_name) {
            return Ok(Arc::clone(dispatcher));
        }

        let config = Arc::clone(&self.config.read());
        let dispatcher = Arc::new(self.create(log_name, config)?);
        dispatchers.insert(log_name.to_string(), Arc::clone(&dispatcher));
        Ok(dispatcher)
    }

    /// A fresh dispatcher with its own configuration.
    ///
    /// Never consults nor changes the shared entries.
    pub fn get_with_config(&self, log_name: &str, config: EffectiveConfig) -> Result<Arc<Dispatcher>> {
        Ok(Arc::new(self.create(log_name, Arc::new(config))?))
    }

    fn create(&self, log_name: &str, config: Arc<EffectiveConfig>) -> Result<Dispatcher> {
        let transport = self.factory.create(&config)?;
        Dispatcher::builder(log_name, transport)
            .config(config)
            .options(self.options.clone())
            .global_context(self.global_context.clone())
            .build()
    }

    /// Replace the default configuration.
    ///
    /// Dispatchers already created keep the configuration they were built with.
    pub fn configure(&self, config: EffectiveConfig) {
        *self.config.write() = Arc::new(config);
    }

    pub fn config(&self) -> Arc<EffectiveConfig> {
        Arc::clone(&self.config.read())
    }

    pub fn len(&self) -> usize {
        self.dispatchers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.read().is_empty()
    }

    pub fn contains(&self, log_name: &str) -> bool {
        self.dispatchers.read().contains_key(log_name)
    }

    pub fn names(&self) -> Vec<String> {
        self.dispatchers.read().keys().cloned().collect()
    }

    /// Set a field merged into records of every dispatcher of this registry
    pub fn set_global_context<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.global_context.set(key, value);
    }

    pub fn global_context(&self) -> &LoggerContext {
        &self.global_context
    }

    /// Flush every shared dispatcher within one overall deadline
    pub fn flush_all(&self, timeout: Duration) -> bool {
        let dispatchers: Vec<_> = self.dispatchers.read().values().cloned().collect();
        let start = Instant::now();
        dispatchers.iter().fold(true, |all_flushed, dispatcher| {
            let remaining = timeout.saturating_sub(start.elapsed());
            dispatcher.flush(remaining) && all_flushed
        })
    }

    /// Forget every shared dispatcher and restore the resolved defaults.
    ///
    /// For test isolation; not meant to race with active logging.
    pub fn reset(&self) {
        let drained: Vec<_> = self.dispatchers.write().drain().map(|(_, d)| d).collect();
        *self.config.write() = Arc::new(self.resolver.resolve(None));
        self.global_context.clear();
        // Dropped outside the locks; the last reference shuts its workers down.
        drop(drained);
    }
}

#[cfg(feature = "http")]
impl LoggerRegistry {
    /// Registry delivering to the configured ingestion server over HTTP
    pub fn http() -> Self {
        Self::new(crate::transports::HttpTransportFactory::default())
    }
}

impl fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerRegistry")
            .field("config", &*self.config.read())
            .field("options", &self.options)
            .field("dispatchers", &self.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigOverrides;
    use crate::core::error::NeuralLogError;
    use crate::core::log_level::LogLevel;
    use crate::core::transport::{SharedTransport, Transport};
    use crate::transports::MemoryTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn counting_registry(created: Arc<AtomicUsize>) -> LoggerRegistry {
        LoggerRegistry::with_config(
            move |_: &EffectiveConfig| -> Result<Arc<dyn Transport>> {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(MemoryTransport::new()))
            },
            EffectiveConfig::default(),
        )
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let created = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(Arc::clone(&created));

        let a = registry.get_or_create("x").unwrap();
        let b = registry.get_or_create("x").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_custom_config_bypasses_cache() {
        let created = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(Arc::clone(&created));
        let shared = registry.get_or_create("x").unwrap();

        let custom = registry
            .get_with_config("x", ConfigOverrides::new().log_level("x", LogLevel::Debug).build())
            .unwrap();

        assert!(!Arc::ptr_eq(&shared, &custom));
        assert_eq!(custom.level(), LogLevel::Debug);
        assert_eq!(shared.level(), LogLevel::Info);
        assert!(Arc::ptr_eq(&shared, &registry.get_or_create("x").unwrap()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_configure_applies_to_new_entries_only() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let before = registry.get_or_create("a").unwrap();

        registry.configure(
            ConfigOverrides::new()
                .log_level("a", LogLevel::Error)
                .log_level("b", LogLevel::Error)
                .build(),
        );
        let after = registry.get_or_create("b").unwrap();

        assert_eq!(before.level(), LogLevel::Info);
        assert_eq!(after.level(), LogLevel::Error);
    }

    #[test]
    fn test_reset_restores_resolved_defaults() {
        let dir = TempDir::new().unwrap();
        let registry = LoggerRegistry::with_resolver(
            SharedTransport(Arc::new(MemoryTransport::new())),
            ConfigResolver::new()
                .with_search_dirs(vec![dir.path().to_path_buf()])
                .with_env(HashMap::new()),
        );
        registry.configure(ConfigOverrides::new().namespace("temp").build());
        registry.get_or_create("x").unwrap();
        registry.set_global_context("build", "42");

        registry.reset();

        assert!(registry.is_empty());
        assert_eq!(registry.config().namespace(), "default");
        assert!(registry.global_context().is_empty());
    }

    #[test]
    fn test_factory_error_is_returned() {
        let registry = LoggerRegistry::with_config(
            |_: &EffectiveConfig| -> Result<Arc<dyn Transport>> {
                Err(NeuralLogError::config("transport", "unreachable"))
            },
            EffectiveConfig::default(),
        );

        assert!(registry.get_or_create("x").is_err());
        assert!(!registry.contains("x"));
    }
}
