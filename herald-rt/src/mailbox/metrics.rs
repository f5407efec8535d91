//! Lock-free mailbox counters.
//!
//! These counters are the core's published telemetry: they track enqueue,
//! dequeue, and drop totals per mailbox without locks on the hot path.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

// Layer 3: Internal module imports
// (none)

/// Recorder interface for mailbox counters.
///
/// A custom recorder can forward counts to an external metrics system; the
/// default [`AtomicMetrics`] keeps them in-process.
pub trait MetricsRecorder: Send + Sync + 'static {
    /// Record one enqueued envelope.
    fn record_enqueued(&self);

    /// Record one dequeued envelope.
    fn record_dequeued(&self);

    /// Record one dropped envelope (backpressure or TTL expiry).
    fn record_dropped(&self);

    /// Update the last-message timestamp.
    fn update_last_message(&self, at: DateTime<Utc>);

    /// Total envelopes enqueued.
    fn enqueued_count(&self) -> u64;

    /// Total envelopes dequeued.
    fn dequeued_count(&self) -> u64;

    /// Total envelopes dropped.
    fn dropped_count(&self) -> u64;

    /// Envelopes enqueued but not yet dequeued.
    ///
    /// Derived from the counters; at quiescence this equals zero and the
    /// dequeued total never exceeds the enqueued total.
    fn in_flight(&self) -> u64 {
        self.enqueued_count().saturating_sub(self.dequeued_count())
    }

    /// Timestamp of the most recent enqueue, if any.
    fn last_message_at(&self) -> Option<DateTime<Utc>>;
}

/// Lock-free atomic metrics recorder.
///
/// Counter operations use `Ordering::Relaxed` atomic adds; only the
/// last-message timestamp takes a lock (a parking_lot `RwLock`, written
/// infrequently relative to reads).
///
/// # Example
/// ```rust
/// use herald_rt::mailbox::{AtomicMetrics, MetricsRecorder};
///
/// let metrics = AtomicMetrics::new();
/// metrics.record_enqueued();
/// metrics.record_dequeued();
///
/// assert_eq!(metrics.enqueued_count(), 1);
/// assert_eq!(metrics.dequeued_count(), 1);
/// assert_eq!(metrics.in_flight(), 0);
/// ```
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    dropped: AtomicU64,
    last_message_at: RwLock<Option<DateTime<Utc>>>,
}

impl AtomicMetrics {
    /// Create a new recorder with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }
}

// Manual Clone implementation: creates a new instance with current values copied
impl Clone for AtomicMetrics {
    fn clone(&self) -> Self {
        Self {
            enqueued: AtomicU64::new(self.enqueued.load(Ordering::Relaxed)),
            dequeued: AtomicU64::new(self.dequeued.load(Ordering::Relaxed)),
            dropped: AtomicU64::new(self.dropped.load(Ordering::Relaxed)),
            last_message_at: RwLock::new(*self.last_message_at.read()),
        }
    }
}

impl MetricsRecorder for AtomicMetrics {
    fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dequeued(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn update_last_message(&self, at: DateTime<Utc>) {
        *self.last_message_at.write() = Some(at);
    }

    fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    fn dequeued_count(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn last_message_at(&self) -> Option<DateTime<Utc>> {
        *self.last_message_at.read()
    }
}
