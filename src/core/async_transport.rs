//! Async transport trait and its bridge onto the worker pool

use super::{
    error::{NeuralLogError, Result},
    log_record::LogRecord,
    transport::Transport,
};
use async_trait::async_trait;

/// Trait for asynchronous transports
///
/// # Example
///
/// ```no_run
/// use neurallog::core::{AsyncTransport, LogRecord, Result};
/// use async_trait::async_trait;
///
/// struct QueueForwarder;
///
/// #[async_trait]
/// impl AsyncTransport for QueueForwarder {
///     async fn send(&self, log_name: &str, entries: &[LogRecord], namespace: &str) -> Result<()> {
///         // publish entries
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "queue_forwarder"
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn send(&self, log_name: &str, entries: &[LogRecord], namespace: &str) -> Result<()>;

    fn name(&self) -> &str;
}

/// Runs an [`AsyncTransport`] on a private current-thread runtime so it can
/// be used wherever a blocking [`Transport`] is expected.
pub struct BlockingTransport<T> {
    inner: T,
    runtime: tokio::runtime::Runtime,
}

impl<T: AsyncTransport> BlockingTransport<T> {
    pub fn new(inner: T) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NeuralLogError::config("BlockingTransport", e.to_string()))?;
        Ok(Self { inner, runtime })
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: AsyncTransport> Transport for BlockingTransport<T> {
    fn send(&self, log_name: &str, entries: &[LogRecord], namespace: &str) -> Result<()> {
        self.runtime
            .block_on(self.inner.send(log_name, entries, namespace))
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
