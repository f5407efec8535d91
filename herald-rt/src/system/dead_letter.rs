//! Dead-letter sink.
//!
//! Captures every envelope that could not be delivered, in a bounded ring
//! buffer with per-reason counters. Not persistent; middleware may observe
//! through the pipeline's dead-letter hook.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::message::{Message, MessageEnvelope};

/// Why an envelope landed in the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// No actor registered under the target pid
    UnknownTarget,

    /// The target actor stopped before delivery
    ActorStopped,

    /// Evicted or rejected by mailbox admission control
    BackpressureDrop,

    /// TTL expired before the target's turn dequeued it
    Expired,

    /// A middleware interceptor dropped it
    MiddlewareDrop,
}

impl fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTarget => write!(f, "unknown_target"),
            Self::ActorStopped => write!(f, "actor_stopped"),
            Self::BackpressureDrop => write!(f, "backpressure_drop"),
            Self::Expired => write!(f, "expired"),
            Self::MiddlewareDrop => write!(f, "middleware_drop"),
        }
    }
}

/// One captured envelope.
#[derive(Debug, Clone)]
pub struct DeadLetter<M: Message> {
    /// The undeliverable envelope
    pub envelope: MessageEnvelope<M>,

    /// Why it was undeliverable
    pub reason: DeadLetterReason,

    /// When the sink recorded it
    pub recorded_at: DateTime<Utc>,
}

/// Bounded dead-letter buffer with counters.
pub struct DeadLetterSink<M: Message> {
    capacity: usize,
    entries: Mutex<VecDeque<DeadLetter<M>>>,
    total: AtomicU64,
    unknown_target: AtomicU64,
    actor_stopped: AtomicU64,
    backpressure: AtomicU64,
    expired: AtomicU64,
    middleware: AtomicU64,
}

impl<M: Message> DeadLetterSink<M> {
    /// Create a sink keeping at most `capacity` recent envelopes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
            total: AtomicU64::new(0),
            unknown_target: AtomicU64::new(0),
            actor_stopped: AtomicU64::new(0),
            backpressure: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            middleware: AtomicU64::new(0),
        }
    }

    /// Record an undeliverable envelope, evicting the oldest past capacity.
    pub fn record(&self, envelope: MessageEnvelope<M>, reason: DeadLetterReason) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.counter(reason).fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(DeadLetter {
            envelope,
            reason,
            recorded_at: Utc::now(),
        });
    }

    /// Envelopes currently buffered.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Envelopes recorded over the sink's lifetime.
    pub fn total_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Lifetime count for one reason.
    pub fn count(&self, reason: DeadLetterReason) -> u64 {
        self.counter(reason).load(Ordering::Relaxed)
    }

    /// The most recent `n` dead letters, oldest first.
    pub fn recent(&self, n: usize) -> Vec<DeadLetter<M>> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    fn counter(&self, reason: DeadLetterReason) -> &AtomicU64 {
        match reason {
            DeadLetterReason::UnknownTarget => &self.unknown_target,
            DeadLetterReason::ActorStopped => &self.actor_stopped,
            DeadLetterReason::BackpressureDrop => &self.backpressure,
            DeadLetterReason::Expired => &self.expired,
            DeadLetterReason::MiddlewareDrop => &self.middleware,
        }
    }
}
