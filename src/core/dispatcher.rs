//! Asynchronous dispatcher: gate, record construction and background delivery

use super::{
    config::EffectiveConfig,
    context::{
        current_thread_name, ContextNormalizer, DerivedFields, LoggerContext, SourceLocation,
        StructuredData,
    },
    error::{NeuralLogError, Result},
    log_level::LogLevel,
    log_record::{ErrorInfo, LogRecord},
    mdc::Mdc,
    metrics::DispatcherMetrics,
    overflow_policy::{stderr_send_failure, OverflowCallback, OverflowPolicy, SendFailureCallback},
    serializer::Loggable,
    transport::Transport,
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default shutdown timeout for dispatcher cleanup (5 seconds)
///
/// Used when the dispatcher is dropped without explicit shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_BATCH_LINGER: Duration = Duration::from_millis(10);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

thread_local! {
    static DISPATCH_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Whether the calling thread is a dispatcher worker.
///
/// Log calls made on a worker, typically by a transport's HTTP client while
/// it sends, are discarded so that a bridge never feeds a dispatcher its own
/// output.
pub fn is_dispatch_worker() -> bool {
    DISPATCH_WORKER.with(Cell::get)
}

/// Tuning of the queue and the worker pool
#[derive(Clone)]
pub struct DispatcherOptions {
    pub workers: usize,
    pub queue_capacity: usize,
    pub batch_size: usize,
    /// How long a worker waits to fill a small batch
    pub batch_linger: Duration,
    pub overflow_policy: OverflowPolicy,
    pub on_overflow: Option<OverflowCallback>,
    pub on_send_failure: SendFailureCallback,
}

impl DispatcherOptions {
    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(NeuralLogError::config("Dispatcher", "workers must be greater than 0"));
        }
        if self.queue_capacity == 0 {
            return Err(NeuralLogError::config(
                "Dispatcher",
                "queue_capacity must be greater than 0",
            ));
        }
        if self.batch_size == 0 {
            return Err(NeuralLogError::config("Dispatcher", "batch_size must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_linger: DEFAULT_BATCH_LINGER,
            overflow_policy: OverflowPolicy::default(),
            on_overflow: None,
            on_send_failure: stderr_send_failure(),
        }
    }
}

impl fmt::Debug for DispatcherOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherOptions")
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("batch_size", &self.batch_size)
            .field("batch_linger", &self.batch_linger)
            .field("overflow_policy", &self.overflow_policy)
            .field("on_overflow", &self.on_overflow.is_some())
            .finish_non_exhaustive()
    }
}

/// A log call as handed over by a framework shim.
///
/// Fields left unset are filled in from the calling thread: the MDC snapshot,
/// the thread name and the dispatcher's own log name.
#[derive(Debug)]
pub struct LogEvent<'a> {
    pub level: LogLevel,
    pub message: String,
    pub data: Option<StructuredData<'a>>,
    /// Single fields layered over `data`
    pub fields: Map<String, Value>,
    pub error: Option<ErrorInfo>,
    pub ambient: Option<HashMap<String, String>>,
    pub logger: Option<String>,
    pub thread: Option<String>,
    pub location: Option<SourceLocation>,
}

impl<'a> LogEvent<'a> {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            data: None,
            fields: Map::new(),
            error: None,
            ambient: None,
            logger: None,
            thread: None,
            location: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<StructuredData<'a>>) -> Self {
        self.data = Some(data.into());
        self
    }

    #[must_use]
    pub fn with_object(mut self, object: &'a dyn Loggable) -> Self {
        self.data = Some(StructuredData::Object(object));
        self
    }

    /// Add one field; it overrides a key of the same name in `data`
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    /// Use this ambient context instead of the calling thread's MDC
    #[must_use]
    pub fn with_ambient(mut self, ambient: HashMap<String, String>) -> Self {
        self.ambient = Some(ambient);
        self
    }

    /// Name of the native logger that produced the event
    #[must_use]
    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    #[must_use]
    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = Some(thread.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// State shared between the dispatcher and its workers
struct WorkerShared {
    log_name: String,
    namespace: String,
    transport: Arc<dyn Transport>,
    metrics: Arc<DispatcherMetrics>,
    pending: AtomicUsize,
    on_send_failure: SendFailureCallback,
    batch_size: usize,
    batch_linger: Duration,
}

/// Non-blocking front door for one log name.
///
/// Level checks and record construction happen on the calling thread; the
/// network send happens on a bounded pool of worker threads fed by a bounded
/// queue. Nothing a transport does can block, fail or panic a logging call.
///
/// # Example
///
/// ```
/// use neurallog::prelude::*;
/// use neurallog::transports::MemoryTransport;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let transport = Arc::new(MemoryTransport::new());
/// let config = EffectiveConfig::builder().log_level("svc", LogLevel::Warn).build();
/// let dispatcher = Dispatcher::builder("svc", transport.clone())
///     .config(Arc::new(config))
///     .build()
///     .unwrap();
///
/// dispatcher.info("filtered out");
/// dispatcher.error("delivered");
/// assert!(dispatcher.flush(Duration::from_secs(1)));
/// assert_eq!(transport.len(), 1);
/// ```
pub struct Dispatcher {
    log_name: String,
    threshold: LogLevel,
    config: Arc<EffectiveConfig>,
    normalizer: ContextNormalizer,
    context: LoggerContext,
    global_context: Option<LoggerContext>,
    sender: RwLock<Option<Sender<LogRecord>>>,
    /// Kept for evicting the oldest record under `DropOldest`
    receiver: Receiver<LogRecord>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    shared: Arc<WorkerShared>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    capacity: usize,
}

impl Dispatcher {
    #[must_use]
    pub fn builder(log_name: impl Into<String>, transport: Arc<dyn Transport>) -> DispatcherBuilder {
        DispatcherBuilder::new(log_name, transport)
    }

    fn start(
        log_name: String,
        transport: Arc<dyn Transport>,
        config: Arc<EffectiveConfig>,
        options: DispatcherOptions,
        context: LoggerContext,
        global_context: Option<LoggerContext>,
    ) -> Result<Self> {
        options.validate()?;

        let (sender, receiver) = bounded(options.queue_capacity);
        let shared = Arc::new(WorkerShared {
            log_name: log_name.clone(),
            namespace: config.namespace().to_string(),
            transport,
            metrics: Arc::new(DispatcherMetrics::new()),
            pending: AtomicUsize::new(0),
            on_send_failure: options.on_send_failure.clone(),
            batch_size: options.batch_size,
            batch_linger: options.batch_linger,
        });

        let mut workers = Vec::with_capacity(options.workers);
        for idx in 0..options.workers {
            let receiver = receiver.clone();
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("neurallog-{}-{}", log_name, idx))
                .spawn(move || Self::worker_loop(&receiver, &shared))?;
            workers.push(handle);
        }

        Ok(Self {
            threshold: config.level_for(&log_name),
            normalizer: ContextNormalizer::new(config.serializer()),
            log_name,
            config,
            context,
            global_context,
            sender: RwLock::new(Some(sender)),
            receiver,
            workers: Mutex::new(workers),
            shared,
            overflow_policy: options.overflow_policy,
            on_overflow: options.on_overflow,
            capacity: options.queue_capacity,
        })
    }

    fn worker_loop(receiver: &Receiver<LogRecord>, shared: &WorkerShared) {
        DISPATCH_WORKER.with(|flag| flag.set(true));
        let mut batch = Vec::with_capacity(shared.batch_size);

        loop {
            match receiver.recv() {
                Ok(record) => batch.push(record),
                // Queue closed and drained
                Err(_) => break,
            }

            Self::fill_batch(receiver, &mut batch, shared.batch_size);

            if batch.len() < shared.batch_size && !shared.batch_linger.is_zero() {
                thread::sleep(shared.batch_linger);
                Self::fill_batch(receiver, &mut batch, shared.batch_size);
            }

            Self::process_batch(shared, &batch);
            batch.clear();
        }
    }

    fn fill_batch(receiver: &Receiver<LogRecord>, batch: &mut Vec<LogRecord>, batch_size: usize) {
        while batch.len() < batch_size {
            match receiver.try_recv() {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
        }
    }

    /// Hand one batch to the transport.
    ///
    /// Errors and panics are contained here and reported to the failure
    /// callback; the batch is dropped either way.
    fn process_batch(shared: &WorkerShared, batch: &[LogRecord]) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            shared
                .transport
                .send(&shared.log_name, batch, &shared.namespace)
        }));

        let failure = match result {
            Ok(Ok(())) => {
                shared.metrics.record_sent(batch.len());
                None
            }
            Ok(Err(e)) => Some(e),
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                Some(NeuralLogError::dispatch(
                    &shared.log_name,
                    batch.len(),
                    format!("transport '{}' panicked: {}", shared.transport.name(), panic_msg),
                ))
            }
        };

        if let Some(err) = failure {
            shared.metrics.record_failed(batch.len());
            let report = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (shared.on_send_failure)(&err)
            }));
            if report.is_err() {
                eprintln!("[NEURALLOG ERROR] Send failure callback panicked: {}", err);
            }
        }

        shared.pending.fetch_sub(batch.len(), Ordering::AcqRel);
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    /// Threshold fixed at construction
    pub fn level(&self) -> LogLevel {
        self.threshold
    }

    pub fn config(&self) -> &Arc<EffectiveConfig> {
        &self.config
    }

    /// Persistent fields merged into every record of this dispatcher
    pub fn context(&self) -> &LoggerContext {
        &self.context
    }

    pub fn metrics(&self) -> &DispatcherMetrics {
        &self.shared.metrics
    }

    /// Records accepted but not yet handed to the transport
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level.is_enabled_for(self.threshold)
    }

    #[inline]
    pub fn is_trace_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Trace)
    }

    #[inline]
    pub fn is_debug_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Debug)
    }

    #[inline]
    pub fn is_info_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Info)
    }

    #[inline]
    pub fn is_warn_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Warn)
    }

    #[inline]
    pub fn is_error_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Error)
    }

    #[inline]
    pub fn is_fatal_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Fatal)
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if !self.is_enabled(level) {
            return;
        }
        self.dispatch(LogEvent::new(level, message));
    }

    /// Log with explicit structured data
    pub fn log_data<'a>(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        data: impl Into<StructuredData<'a>>,
    ) {
        if !self.is_enabled(level) {
            return;
        }
        self.dispatch(LogEvent::new(level, message).with_data(data));
    }

    /// Log with an arbitrary object converted by the configured serializer
    pub fn log_object(&self, level: LogLevel, message: impl Into<String>, object: &dyn Loggable) {
        if !self.is_enabled(level) {
            return;
        }
        self.dispatch(LogEvent::new(level, message).with_object(object));
    }

    pub fn log_error<E: Error + 'static>(&self, level: LogLevel, message: impl Into<String>, error: &E) {
        if !self.is_enabled(level) {
            return;
        }
        self.dispatch(LogEvent::new(level, message).with_error(ErrorInfo::from_error(error)));
    }

    pub fn log_error_with_data<'a, E: Error + 'static>(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        error: &E,
        data: impl Into<StructuredData<'a>>,
    ) {
        if !self.is_enabled(level) {
            return;
        }
        self.dispatch(
            LogEvent::new(level, message)
                .with_data(data)
                .with_error(ErrorInfo::from_error(error)),
        );
    }

    /// Gate, normalize and enqueue a prepared event
    pub fn dispatch(&self, event: LogEvent<'_>) {
        if !self.is_enabled(event.level) || is_dispatch_worker() {
            return;
        }
        let record = self.build_record(event);
        self.enqueue(record);
    }

    fn build_record(&self, event: LogEvent<'_>) -> LogRecord {
        let ambient = event.ambient.unwrap_or_else(Mdc::snapshot);
        let mut derived = DerivedFields::new()
            .logger(event.logger.unwrap_or_else(|| self.log_name.clone()))
            .thread(event.thread.unwrap_or_else(current_thread_name));
        derived.location = event.location;
        let explicit = self.explicit_data(event.data, event.fields);

        let context = match &self.global_context {
            Some(global) if !global.is_empty() => {
                let mut persistent = global.get_fields();
                self.context
                    .with_fields(|fields| persistent.extend(fields.clone()));
                self.normalizer
                    .normalize(&persistent, &ambient, explicit, &derived)
            }
            _ => self.context.with_fields(|persistent| {
                self.normalizer
                    .normalize(persistent, &ambient, explicit, &derived)
            }),
        };

        LogRecord::new(&self.log_name, event.level, event.message)
            .with_context(context)
            .with_error(event.error)
    }

    /// Fold single fields into the structured data, serializing an object first
    fn explicit_data<'a>(
        &self,
        data: Option<StructuredData<'a>>,
        fields: Map<String, Value>,
    ) -> Option<StructuredData<'a>> {
        if fields.is_empty() {
            return data;
        }
        let mut merged = match data {
            Some(StructuredData::Map(map)) => map,
            Some(StructuredData::Object(object)) => self.normalizer.serialize_object(object),
            None => Map::new(),
        };
        merged.extend(fields);
        Some(StructuredData::Map(merged))
    }

    /// Enqueue without blocking, applying the overflow policy on a full queue
    fn enqueue(&self, record: LogRecord) {
        let sender_guard = self.sender.read();
        let Some(sender) = sender_guard.as_ref() else {
            // Shutting down
            return;
        };

        // Counted before the send so a fast worker never sees it underflow.
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        let record = match sender.try_send(record) {
            Ok(()) => {
                self.shared.metrics.record_enqueued();
                return;
            }
            Err(TrySendError::Disconnected(_)) => {
                self.shared.pending.fetch_sub(1, Ordering::AcqRel);
                return;
            }
            Err(TrySendError::Full(record)) => record,
        };

        self.shared.metrics.record_overflow();
        match self.overflow_policy {
            OverflowPolicy::DropNewest => {
                self.shared.pending.fetch_sub(1, Ordering::AcqRel);
                self.record_drop();
            }
            OverflowPolicy::DropOldest => {
                if self.receiver.try_recv().is_ok() {
                    self.shared.pending.fetch_sub(1, Ordering::AcqRel);
                    self.record_drop();
                }
                match sender.try_send(record) {
                    Ok(()) => {
                        self.shared.metrics.record_enqueued();
                    }
                    Err(_) => {
                        // Another producer took the freed slot.
                        self.shared.pending.fetch_sub(1, Ordering::AcqRel);
                        self.record_drop();
                    }
                }
            }
        }
    }

    fn record_drop(&self) {
        let dropped = self.shared.metrics.record_dropped();

        // Alert on first drop and periodically thereafter
        if dropped == 1 || dropped % 1000 == 0 {
            eprintln!(
                "[NEURALLOG WARNING] Queue for '{}' full ({} slots), {} records dropped ({}).",
                self.log_name, self.capacity, dropped, self.overflow_policy
            );
        }

        if let Some(ref callback) = self.on_overflow {
            callback(dropped);
        }
    }

    /// Wait until every accepted record has been handed to the transport.
    ///
    /// Returns `false` if records are still pending when `timeout` expires.
    pub fn flush(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.pending() == 0 {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Close the queue and wait for the workers to drain it.
    ///
    /// Later log calls are ignored. Returns `true` if every worker finished
    /// within `timeout`.
    ///
    /// **Note**: When the dispatcher is dropped without calling `shutdown()`
    /// explicitly, it uses [`DEFAULT_SHUTDOWN_TIMEOUT`].
    ///
    /// # Example
    ///
    /// ```
    /// use neurallog::prelude::*;
    /// use neurallog::transports::MemoryTransport;
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let transport = Arc::new(MemoryTransport::new());
    /// let dispatcher = Dispatcher::builder("jobs", transport.clone()).build().unwrap();
    /// dispatcher.warn("retrying");
    ///
    /// assert!(dispatcher.shutdown(Duration::from_secs(5)));
    /// assert_eq!(transport.len(), 1);
    ///
    /// dispatcher.warn("ignored after shutdown");
    /// assert_eq!(transport.len(), 1);
    /// ```
    pub fn shutdown(&self, timeout: Duration) -> bool {
        // Closing the channel lets workers drain what is queued, then exit.
        drop(self.sender.write().take());

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        let start = Instant::now();
        let mut clean = true;

        for handle in handles {
            loop {
                if handle.is_finished() {
                    if let Err(e) = handle.join() {
                        eprintln!(
                            "[NEURALLOG ERROR] Worker for '{}' panicked during shutdown: {:?}",
                            self.log_name, e
                        );
                        clean = false;
                    }
                    break;
                }

                if start.elapsed() >= timeout {
                    eprintln!(
                        "[NEURALLOG WARNING] Worker for '{}' did not finish within {:?}. \
                         Some records may be lost.",
                        self.log_name, timeout
                    );
                    clean = false;
                    break;
                }

                thread::sleep(POLL_INTERVAL);
            }
        }

        clean
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.read().is_none()
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if !self.is_shutdown() {
            self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        }

        let metrics = &self.shared.metrics;
        if metrics.dropped() > 0 || metrics.failed() > 0 {
            eprintln!(
                "[NEURALLOG WARNING] Dispatcher '{}' closing with {} dropped and {} unsent records \
                 (drop rate: {:.2}%)",
                self.log_name,
                metrics.dropped(),
                metrics.failed(),
                metrics.drop_rate()
            );
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("log_name", &self.log_name)
            .field("threshold", &self.threshold)
            .field("transport", &self.shared.transport.name())
            .field("overflow_policy", &self.overflow_policy)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Dispatcher`] with a fluent API
///
/// # Example
/// ```
/// use neurallog::prelude::*;
/// use neurallog::transports::MemoryTransport;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let dispatcher = Dispatcher::builder("orders", Arc::new(MemoryTransport::new()))
///     .workers(4)
///     .queue_capacity(10_000)
///     .batch_linger(Duration::from_millis(20))
///     .overflow_policy(OverflowPolicy::DropNewest)
///     .on_overflow(Arc::new(|count| {
///         eprintln!("ALERT: {} records dropped", count);
///     }))
///     .build()
///     .unwrap();
/// ```
pub struct DispatcherBuilder {
    log_name: String,
    transport: Arc<dyn Transport>,
    config: Option<Arc<EffectiveConfig>>,
    options: DispatcherOptions,
    context: LoggerContext,
    global_context: Option<LoggerContext>,
}

impl DispatcherBuilder {
    pub fn new(log_name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            log_name: log_name.into(),
            transport,
            config: None,
            options: DispatcherOptions::default(),
            context: LoggerContext::new(),
            global_context: None,
        }
    }

    /// Configuration the threshold, namespace and serializer are taken from
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: Arc<EffectiveConfig>) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn options(mut self, options: DispatcherOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn workers(mut self, workers: usize) -> Self {
        self.options.workers = workers;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.options.queue_capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.options.batch_size = size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn batch_linger(mut self, linger: Duration) -> Self {
        self.options.batch_linger = linger;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.options.overflow_policy = policy;
        self
    }

    /// Called with the running total each time a record is dropped
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.options.on_overflow = Some(callback);
        self
    }

    /// Replaces the default stderr report for failed sends
    #[must_use = "builder methods return a new value"]
    pub fn on_send_failure(mut self, callback: SendFailureCallback) -> Self {
        self.options.on_send_failure = callback;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn context(mut self, context: LoggerContext) -> Self {
        self.context = context;
        self
    }

    /// Fields shared with other dispatchers, overridden by this one's context
    #[must_use = "builder methods return a new value"]
    pub fn global_context(mut self, context: LoggerContext) -> Self {
        self.global_context = Some(context);
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        let config = self
            .config
            .unwrap_or_else(|| Arc::new(EffectiveConfig::default()));
        Dispatcher::start(
            self.log_name,
            self.transport,
            config,
            self.options,
            self.context,
            self.global_context,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigOverrides;
    use crate::core::context::LogContext;
    use parking_lot::Mutex as PlMutex;
    use std::sync::atomic::{AtomicBool, AtomicU64};

    /// Records every batch; optionally fails or blocks.
    #[derive(Default)]
    struct Probe {
        batches: PlMutex<Vec<Vec<LogRecord>>>,
        fail_first: AtomicBool,
        panic_first: AtomicBool,
        gate: PlMutex<()>,
    }

    impl Probe {
        fn records(&self) -> Vec<LogRecord> {
            self.batches.lock().iter().flatten().cloned().collect()
        }
    }

    impl Transport for Probe {
        fn send(&self, log_name: &str, entries: &[LogRecord], _namespace: &str) -> Result<()> {
            let _gate = self.gate.lock();
            if self.panic_first.swap(false, Ordering::SeqCst) {
                panic!("transport exploded");
            }
            if self.fail_first.swap(false, Ordering::SeqCst) {
                return Err(NeuralLogError::dispatch(log_name, entries.len(), "HTTP 503"));
            }
            self.batches.lock().push(entries.to_vec());
            Ok(())
        }

        fn name(&self) -> &str {
            "probe"
        }
    }

    fn config_with(log_name: &str, level: LogLevel) -> Arc<EffectiveConfig> {
        Arc::new(ConfigOverrides::new().log_level(log_name, level).build())
    }

    #[test]
    fn test_gate_uses_configured_level() {
        let probe = Arc::new(Probe::default());
        let dispatcher = Dispatcher::builder("svc", probe.clone())
            .config(config_with("svc", LogLevel::Warn))
            .build()
            .unwrap();

        assert_eq!(dispatcher.level(), LogLevel::Warn);
        dispatcher.info("hi");
        dispatcher.error("bad");
        assert!(dispatcher.flush(Duration::from_secs(2)));

        let records = probe.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::Error);
        assert_eq!(records[0].message, "bad");
        assert_eq!(dispatcher.metrics().enqueued(), 1);
    }

    #[test]
    fn test_unconfigured_name_defaults_to_info() {
        let dispatcher = Dispatcher::builder("other", Arc::new(Probe::default()))
            .config(config_with("svc", LogLevel::Trace))
            .build()
            .unwrap();
        assert!(!dispatcher.is_debug_enabled());
        assert!(dispatcher.is_info_enabled());
        assert!(dispatcher.is_fatal_enabled());
    }

    #[test]
    fn test_record_carries_derived_fields() {
        let probe = Arc::new(Probe::default());
        let dispatcher = Dispatcher::builder("svc", probe.clone()).build().unwrap();
        dispatcher.context().set("region", "eu-west-1");

        dispatcher.dispatch(
            LogEvent::new(LogLevel::Info, "hello")
                .with_field("a", 1)
                .with_logger("com.acme.Billing")
                .with_thread("main"),
        );
        assert!(dispatcher.flush(Duration::from_secs(2)));

        let record = &probe.records()[0];
        assert_eq!(record.log_name, "svc");
        assert_eq!(record.context["a"], 1);
        assert_eq!(record.context["region"], "eu-west-1");
        assert_eq!(record.context["logger"], "com.acme.Billing");
        assert_eq!(record.context["thread"], "main");
    }

    #[test]
    fn test_failing_transport_is_contained() {
        let probe = Arc::new(Probe::default());
        probe.fail_first.store(true, Ordering::SeqCst);
        let failures = Arc::new(AtomicU64::new(0));
        let failures_clone = Arc::clone(&failures);

        let dispatcher = Dispatcher::builder("svc", probe.clone())
            .workers(1)
            .batch_linger(Duration::ZERO)
            .on_send_failure(Arc::new(move |err: &NeuralLogError| {
                assert!(matches!(err, NeuralLogError::Dispatch { .. }));
                failures_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .build()
            .unwrap();

        dispatcher.error("lost");
        assert!(dispatcher.flush(Duration::from_secs(2)));
        dispatcher.error("delivered");
        assert!(dispatcher.flush(Duration::from_secs(2)));

        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.metrics().failed(), 1);
        let records = probe.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "delivered");
    }

    #[test]
    fn test_panicking_transport_is_contained() {
        let probe = Arc::new(Probe::default());
        probe.panic_first.store(true, Ordering::SeqCst);
        let dispatcher = Dispatcher::builder("svc", probe.clone())
            .workers(1)
            .batch_linger(Duration::ZERO)
            .on_send_failure(Arc::new(|_: &NeuralLogError| {}))
            .build()
            .unwrap();

        dispatcher.warn("first");
        assert!(dispatcher.flush(Duration::from_secs(2)));
        dispatcher.warn("second");
        assert!(dispatcher.shutdown(Duration::from_secs(2)));

        assert_eq!(dispatcher.metrics().failed_batches(), 1);
        assert_eq!(probe.records().len(), 1);
    }

    #[test]
    fn test_drop_newest_discards_incoming() {
        let probe = Arc::new(Probe::default());
        let dropped = Arc::new(AtomicU64::new(0));
        let dropped_clone = Arc::clone(&dropped);
        let dispatcher = Dispatcher::builder("svc", probe.clone())
            .workers(1)
            .queue_capacity(2)
            .batch_size(1)
            .batch_linger(Duration::ZERO)
            .overflow_policy(OverflowPolicy::DropNewest)
            .on_overflow(Arc::new(move |total| {
                dropped_clone.store(total, Ordering::SeqCst);
            }))
            .build()
            .unwrap();

        {
            // Stall the worker so the queue saturates.
            let _held = probe.gate.lock();
            for i in 0..20 {
                dispatcher.info(format!("message {}", i));
            }
        }
        assert!(dispatcher.flush(Duration::from_secs(2)));

        let delivered = probe.records().len() as u64;
        assert!(dispatcher.metrics().dropped() > 0);
        assert_eq!(delivered + dispatcher.metrics().dropped(), 20);
        assert_eq!(dropped.load(Ordering::SeqCst), dispatcher.metrics().dropped());
    }

    #[test]
    fn test_drop_oldest_keeps_newest() {
        let probe = Arc::new(Probe::default());
        let dispatcher = Dispatcher::builder("svc", probe.clone())
            .workers(1)
            .queue_capacity(4)
            .batch_size(1)
            .batch_linger(Duration::ZERO)
            .overflow_policy(OverflowPolicy::DropOldest)
            .build()
            .unwrap();

        {
            let _held = probe.gate.lock();
            for i in 0..50 {
                dispatcher.info(format!("message {}", i));
            }
        }
        assert!(dispatcher.flush(Duration::from_secs(2)));

        let messages: Vec<String> = probe.records().into_iter().map(|r| r.message).collect();
        assert!(messages.contains(&"message 49".to_string()));
        assert!(dispatcher.metrics().dropped() > 0);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn test_fields_added_to_object_data() {
        #[derive(Debug, serde::Serialize)]
        struct Order {
            id: u32,
            total: f64,
        }

        let probe = Arc::new(Probe::default());
        let dispatcher = Dispatcher::builder("svc", probe.clone()).build().unwrap();
        let order = Order { id: 7, total: 12.5 };

        dispatcher.dispatch(
            LogEvent::new(LogLevel::Info, "order placed")
                .with_object(&order)
                .with_field("channel", "web")
                .with_field("id", 8),
        );
        dispatcher.dispatch(
            LogEvent::new(LogLevel::Info, "fields first")
                .with_field("k", "v")
                .with_data(LogContext::new().with_field("a", 1)),
        );
        assert!(dispatcher.flush(Duration::from_secs(2)));

        let mut records = probe.records();
        records.sort_by(|a, b| a.message.cmp(&b.message));
        assert_eq!(records[0].context["k"], "v");
        assert_eq!(records[0].context["a"], 1);
        assert_eq!(records[1].context["total"], 12.5);
        assert_eq!(records[1].context["channel"], "web");
        assert_eq!(records[1].context["id"], 8);
    }

    /// Calls back into its own dispatcher from inside `send`
    struct Reentrant {
        dispatcher: parking_lot::RwLock<Option<std::sync::Weak<Dispatcher>>>,
        seen_on_worker: AtomicBool,
        inner: Probe,
    }

    impl Transport for Reentrant {
        fn send(&self, log_name: &str, entries: &[LogRecord], namespace: &str) -> Result<()> {
            self.seen_on_worker.store(is_dispatch_worker(), Ordering::SeqCst);
            if let Some(dispatcher) = self.dispatcher.read().as_ref().and_then(|d| d.upgrade()) {
                dispatcher.info("sending batch");
            }
            self.inner.send(log_name, entries, namespace)
        }

        fn name(&self) -> &str {
            "reentrant"
        }
    }

    #[test]
    fn test_log_calls_on_worker_threads_are_discarded() {
        let transport = Arc::new(Reentrant {
            dispatcher: parking_lot::RwLock::new(None),
            seen_on_worker: AtomicBool::new(false),
            inner: Probe::default(),
        });
        let dispatcher = Arc::new(
            Dispatcher::builder("svc", transport.clone())
                .workers(1)
                .batch_linger(Duration::ZERO)
                .build()
                .unwrap(),
        );
        *transport.dispatcher.write() = Some(Arc::downgrade(&dispatcher));

        assert!(!is_dispatch_worker());
        dispatcher.info("one application record");
        assert!(dispatcher.flush(Duration::from_secs(2)));
        thread::sleep(Duration::from_millis(50));
        assert!(dispatcher.flush(Duration::from_secs(2)));

        assert!(transport.seen_on_worker.load(Ordering::SeqCst));
        let records = transport.inner.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "one application record");
        assert_eq!(dispatcher.metrics().enqueued(), 1);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let err = Dispatcher::builder("svc", Arc::new(Probe::default()))
            .workers(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, NeuralLogError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_disabled_error_is_not_captured() {
        #[derive(Debug)]
        struct Boom;
        impl fmt::Display for Boom {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "boom")
            }
        }
        impl Error for Boom {}

        let probe = Arc::new(Probe::default());
        let dispatcher = Dispatcher::builder("svc", probe.clone())
            .config(config_with("svc", LogLevel::Fatal))
            .build()
            .unwrap();

        dispatcher.log_error(LogLevel::Error, "skipped", &Boom);
        dispatcher.log_error(LogLevel::Fatal, "kept", &Boom);
        assert!(dispatcher.flush(Duration::from_secs(2)));

        let records = probe.records();
        assert_eq!(records.len(), 1);
        let error = records[0].error.as_ref().unwrap();
        assert_eq!(error.message, "boom");
        assert!(error.type_name.ends_with("Boom"));
    }
}
