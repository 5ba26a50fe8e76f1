//! Dispatcher metrics
//!
//! Counters describing what happened to every record a dispatcher accepted:
//! how many were queued, evicted or discarded on overflow, delivered, or lost
//! to a failed send.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for one dispatcher
///
/// # Example
///
/// ```
/// use neurallog::DispatcherMetrics;
///
/// let metrics = DispatcherMetrics::new();
/// metrics.record_enqueued();
/// metrics.record_enqueued();
/// metrics.record_dropped();
///
/// assert_eq!(metrics.enqueued(), 2);
/// assert_eq!(metrics.dropped(), 1);
/// ```
#[derive(Debug)]
pub struct DispatcherMetrics {
    /// Records accepted into the queue
    enqueued: AtomicU64,

    /// Records discarded because the queue was full
    dropped: AtomicU64,

    /// Number of times the queue was found full
    overflow_events: AtomicU64,

    /// Records handed to the transport successfully
    sent: AtomicU64,

    /// Records lost to transport errors or panics
    failed: AtomicU64,

    /// Batches that failed to send
    failed_batches: AtomicU64,
}

impl DispatcherMetrics {
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            overflow_events: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            failed_batches: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn overflow_events(&self) -> u64 {
        self.overflow_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_batches(&self) -> u64 {
        self.failed_batches.load(Ordering::Relaxed)
    }

    /// Returns the previous value
    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the new total
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    pub fn record_overflow(&self) -> u64 {
        self.overflow_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sent(&self, count: usize) {
        self.sent.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failed(&self, count: usize) {
        self.failed.fetch_add(count as u64, Ordering::Relaxed);
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Share of accepted records lost to overflow, as a percentage
    ///
    /// Returns 0.0 if nothing has been logged.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped() as f64;
        let total = self.enqueued() as f64;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    pub fn reset(&self) {
        self.enqueued.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.overflow_events.store(0, Ordering::Relaxed);
        self.sent.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.failed_batches.store(0, Ordering::Relaxed);
    }
}

impl Default for DispatcherMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DispatcherMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            enqueued: AtomicU64::new(self.enqueued()),
            dropped: AtomicU64::new(self.dropped()),
            overflow_events: AtomicU64::new(self.overflow_events()),
            sent: AtomicU64::new(self.sent()),
            failed: AtomicU64::new(self.failed()),
            failed_batches: AtomicU64::new(self.failed_batches()),
        }
    }
}
