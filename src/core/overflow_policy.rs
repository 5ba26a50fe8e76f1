//! Queue overflow policies and diagnostic callbacks
//!
//! Enqueueing never blocks the caller, so a full queue always costs one
//! record. The policy decides which one.

use super::error::NeuralLogError;
use std::fmt;
use std::sync::Arc;

/// Which record to discard when the dispatch queue is full
///
/// # Example
///
/// ```
/// use neurallog::OverflowPolicy;
///
/// assert_eq!(OverflowPolicy::default(), OverflowPolicy::DropOldest);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the record being logged
    DropNewest,

    /// Evict the oldest queued record, then enqueue the new one
    #[default]
    DropOldest,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::DropOldest => write!(f, "DropOldest"),
        }
    }
}

/// Callback type for overflow notifications
///
/// Called when a record is dropped because the queue is full.
/// The parameter is the total count of dropped records so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Callback type for failed sends
///
/// Receives the dispatch error describing the lost batch. Invoked on a
/// worker thread.
pub type SendFailureCallback = Arc<dyn Fn(&NeuralLogError) + Send + Sync>;

/// Default failure side channel: one line on stderr
pub fn stderr_send_failure() -> SendFailureCallback {
    Arc::new(|err: &NeuralLogError| {
        eprintln!("[NEURALLOG ERROR] {}", err);
    })
}
