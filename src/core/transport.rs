//! Transport trait: the hand-off point to the ingestion service

use super::{config::EffectiveConfig, error::Result, log_record::LogRecord};
use std::sync::Arc;

/// Delivers batches of records for one log name.
///
/// Called concurrently from every worker of a dispatcher. Errors and panics
/// are contained by the dispatcher; they never reach the logging caller.
pub trait Transport: Send + Sync {
    fn send(&self, log_name: &str, entries: &[LogRecord], namespace: &str) -> Result<()>;

    fn name(&self) -> &str;
}

/// Builds the transport for a newly created dispatcher.
///
/// Implemented for closures, so a registry can be given
/// `|config| Ok(Arc::new(MyTransport::new(config)) as Arc<dyn Transport>)`.
pub trait TransportFactory: Send + Sync {
    fn create(&self, config: &EffectiveConfig) -> Result<Arc<dyn Transport>>;
}

impl<F> TransportFactory for F
where
    F: Fn(&EffectiveConfig) -> Result<Arc<dyn Transport>> + Send + Sync,
{
    fn create(&self, config: &EffectiveConfig) -> Result<Arc<dyn Transport>> {
        self(config)
    }
}

/// Factory handing out clones of one shared transport
#[derive(Clone)]
pub struct SharedTransport(pub Arc<dyn Transport>);

impl TransportFactory for SharedTransport {
    fn create(&self, _config: &EffectiveConfig) -> Result<Arc<dyn Transport>> {
        Ok(Arc::clone(&self.0))
    }
}
