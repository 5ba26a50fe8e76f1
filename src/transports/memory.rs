//! In-memory transport, for tests and local inspection

use crate::core::{LogRecord, Result, Transport};
use parking_lot::Mutex;

/// Keeps every delivered batch in memory
///
/// # Example
///
/// ```
/// use neurallog::core::{LogLevel, LogRecord, Transport};
/// use neurallog::transports::MemoryTransport;
///
/// let transport = MemoryTransport::new();
/// let batch = vec![LogRecord::new("svc", LogLevel::Info, "ready")];
/// transport.send("svc", &batch, "default").unwrap();
///
/// assert_eq!(transport.len(), 1);
/// assert_eq!(transport.records()[0].message, "ready");
/// ```
#[derive(Debug, Default)]
pub struct MemoryTransport {
    batches: Mutex<Vec<Delivery>>,
}

/// One call to [`Transport::send`]
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub log_name: String,
    pub namespace: String,
    pub records: Vec<LogRecord>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All delivered records, in delivery order
    pub fn records(&self) -> Vec<LogRecord> {
        self.batches
            .lock()
            .iter()
            .flat_map(|delivery| delivery.records.iter().cloned())
            .collect()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.batches.lock().clone()
    }

    /// Number of delivered records
    pub fn len(&self) -> usize {
        self.batches.lock().iter().map(|d| d.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.batches.lock().clear();
    }
}

impl Transport for MemoryTransport {
    fn send(&self, log_name: &str, entries: &[LogRecord], namespace: &str) -> Result<()> {
        self.batches.lock().push(Delivery {
            log_name: log_name.to_string(),
            namespace: namespace.to_string(),
            records: entries.to_vec(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
