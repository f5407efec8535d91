//! Two-lane, single-consumer mailbox.
//!
//! Each actor owns exactly one mailbox. The system lane (control signals and
//! system-grade user envelopes) must never block or drop; the user lane goes
//! through the backpressure controller. At most one processing turn runs per
//! mailbox at any instant; the mailbox raises a schedule request toward the
//! dispatcher when work arrives and no turn is pending.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::Utc;
use parking_lot::{Mutex, RwLock};

// Layer 3: Internal module imports
use super::backpressure::{BackpressureConfig, BackpressureController, SubmitOutcome};
use super::metrics::{AtomicMetrics, MetricsRecorder};
use super::traits::MailboxError;
use crate::message::{Message, MessageEnvelope, SystemItem};

type ScheduleFn = Arc<dyn Fn() + Send + Sync>;

/// Bounded, prioritized, single-consumer queue for one actor.
///
/// Cloning a `Mailbox` clones a handle to the same queue; the handles are
/// used by the system (enqueue side) and by the actor cell (dequeue side).
///
/// # Invariants
///
/// - `size() = system lane + pending user lane + active set`.
/// - System messages always precede user messages in dequeue order.
/// - At most one turn is in progress at any moment (`try_begin_turn`).
pub struct Mailbox<M: Message> {
    inner: Arc<MailboxInner<M>>,
}

impl<M: Message> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct MailboxInner<M: Message> {
    system: Mutex<VecDeque<SystemItem<M>>>,
    controller: BackpressureController<M>,
    metrics: Arc<AtomicMetrics>,
    turn_active: AtomicBool,
    scheduled: AtomicBool,
    closed: AtomicBool,
    signal: RwLock<Option<ScheduleFn>>,
}

impl<M: Message> Mailbox<M> {
    /// Create a mailbox whose user lane is governed by the given
    /// backpressure configuration.
    pub fn new(backpressure: BackpressureConfig) -> Self {
        Self {
            inner: Arc::new(MailboxInner {
                system: Mutex::new(VecDeque::new()),
                controller: BackpressureController::new(backpressure),
                metrics: Arc::new(AtomicMetrics::new()),
                turn_active: AtomicBool::new(false),
                scheduled: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                signal: RwLock::new(None),
            }),
        }
    }

    /// Install the dispatcher-facing schedule callback.
    ///
    /// Fired whenever work arrives and no turn is scheduled.
    pub(crate) fn set_signal(&self, signal: ScheduleFn) {
        *self.inner.signal.write() = Some(signal);
    }

    /// Enqueue on the system lane. Never blocks, never drops while open.
    ///
    /// After close the item is discarded: the stop path has already drained
    /// the lane and run `post_stop`.
    pub fn post_system(&self, item: SystemItem<M>) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        self.inner.system.lock().push_back(item);
        self.inner.metrics.record_enqueued();
        self.inner.metrics.update_last_message(Utc::now());
        self.request_schedule();
    }

    /// Offer a user envelope through the backpressure controller.
    pub async fn post_user(
        &self,
        envelope: MessageEnvelope<M>,
    ) -> Result<SubmitOutcome<M>, MailboxError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(MailboxError::Closed);
        }

        let outcome = self.inner.controller.submit(envelope).await?;
        match &outcome {
            SubmitOutcome::Accepted | SubmitOutcome::AcceptedDroppedOldest(_) => {
                self.inner.metrics.record_enqueued();
                self.inner.metrics.update_last_message(Utc::now());
                if matches!(&outcome, SubmitOutcome::AcceptedDroppedOldest(_)) {
                    self.inner.metrics.record_dropped();
                }
                self.request_schedule();
            }
            SubmitOutcome::Rejected { .. } => {
                self.inner.metrics.record_dropped();
            }
        }
        Ok(outcome)
    }

    /// Current size: system lane + pending user lane + active set.
    pub fn size(&self) -> usize {
        self.inner.system.lock().len() + self.inner.controller.len()
    }

    /// True when no messages are queued or active.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The mailbox's counters.
    pub fn metrics(&self) -> &Arc<AtomicMetrics> {
        &self.inner.metrics
    }

    /// The user-lane admission controller.
    pub fn controller(&self) -> &BackpressureController<M> {
        &self.inner.controller
    }

    /// Whether the mailbox has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Dequeue the next system-lane item.
    pub(crate) fn next_system(&self) -> Option<SystemItem<M>> {
        let item = self.inner.system.lock().pop_front();
        if item.is_some() {
            self.inner.metrics.record_dequeued();
        }
        item
    }

    /// Dequeue the next user envelope (moves it into the active set).
    pub(crate) fn next_user(&self) -> Option<MessageEnvelope<M>> {
        let envelope = self.inner.controller.next();
        if envelope.is_some() {
            self.inner.metrics.record_dequeued();
        }
        envelope
    }

    /// Mark a dequeued user envelope as fully processed.
    pub(crate) fn complete(&self, id: &crate::util::MessageId) {
        self.inner.controller.complete(id);
    }

    /// Claim the turn token. Fails if a turn is already in progress.
    pub(crate) fn try_begin_turn(&self) -> bool {
        self.inner
            .turn_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the turn token.
    pub(crate) fn end_turn(&self) {
        self.inner.turn_active.store(false, Ordering::Release);
    }

    /// Whether a turn is currently in progress.
    pub fn turn_in_progress(&self) -> bool {
        self.inner.turn_active.load(Ordering::Acquire)
    }

    /// Clear the scheduled flag at the start of a turn so that arrivals
    /// during the turn raise a fresh schedule request.
    pub(crate) fn clear_scheduled(&self) {
        self.inner.scheduled.store(false, Ordering::Release);
    }

    /// Raise a schedule request if none is pending.
    pub(crate) fn request_schedule(&self) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        if self
            .inner
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let signal = self.inner.signal.read().clone();
            if let Some(signal) = signal {
                signal();
            } else {
                // No dispatcher attached yet; the flag stays set and spawn
                // re-raises the request once the signal is installed.
                self.inner.scheduled.store(false, Ordering::Release);
            }
        }
    }

    /// Close the mailbox and drain both lanes.
    ///
    /// Returns the undelivered user envelopes for dead-letter routing. The
    /// remaining system items are returned separately so the stop path can
    /// still act on them.
    pub(crate) fn close(&self) -> (Vec<SystemItem<M>>, Vec<MessageEnvelope<M>>) {
        self.inner.closed.store(true, Ordering::Release);
        let system: Vec<_> = self.inner.system.lock().drain(..).collect();
        let user = self.inner.controller.close();
        (system, user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use crate::mailbox::backpressure::BackpressureStrategy;
    use crate::message::SystemSignal;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq)]
    enum TestMsg {
        User(&'static str),
        SystemHalt,
    }

    impl Message for TestMsg {
        fn message_type(&self) -> &str {
            match self {
                TestMsg::User(_) => "test.user",
                TestMsg::SystemHalt => "system.halt",
            }
        }
    }

    fn mailbox(max: usize) -> Mailbox<TestMsg> {
        Mailbox::new(BackpressureConfig {
            max_queue_size: max,
            strategy: BackpressureStrategy::Throw,
            ..BackpressureConfig::default()
        })
    }

    #[tokio::test]
    async fn test_size_counts_both_lanes_and_active() {
        let mb = mailbox(8);

        mb.post_system(SystemItem::Signal(SystemSignal::Start));
        mb.post_user(MessageEnvelope::new(TestMsg::User("a"))).await.unwrap();
        mb.post_user(MessageEnvelope::new(TestMsg::User("b"))).await.unwrap();
        assert_eq!(mb.size(), 3);

        // Moving a user envelope into the active set keeps it in the size.
        let envelope = mb.next_user().unwrap();
        assert_eq!(mb.size(), 3);

        mb.complete(&envelope.message_id);
        assert_eq!(mb.size(), 2);
    }

    #[tokio::test]
    async fn test_system_lane_dequeues_first() {
        let mb = mailbox(8);

        mb.post_user(MessageEnvelope::new(TestMsg::User("u"))).await.unwrap();
        mb.post_system(SystemItem::Signal(SystemSignal::Stop));

        // The turn loop always drains next_system before next_user.
        assert!(mb.next_system().is_some());
        assert!(mb.next_system().is_none());
        assert!(mb.next_user().is_some());
    }

    #[tokio::test]
    async fn test_single_turn_token() {
        let mb = mailbox(8);

        assert!(mb.try_begin_turn());
        assert!(!mb.try_begin_turn());
        assert!(mb.turn_in_progress());

        mb.end_turn();
        assert!(mb.try_begin_turn());
    }

    #[tokio::test]
    async fn test_schedule_signal_fires_once_until_cleared() {
        let mb = mailbox(8);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        mb.set_signal(Arc::new(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));

        mb.post_user(MessageEnvelope::new(TestMsg::User("a"))).await.unwrap();
        mb.post_user(MessageEnvelope::new(TestMsg::User("b"))).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        mb.clear_scheduled();
        mb.post_user(MessageEnvelope::new(TestMsg::User("c"))).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_post_user_after_close_errors() {
        let mb = mailbox(8);

        mb.post_user(MessageEnvelope::new(TestMsg::User("a"))).await.unwrap();
        let (_system, user) = mb.close();
        assert_eq!(user.len(), 1);

        let result = mb.post_user(MessageEnvelope::new(TestMsg::User("b"))).await;
        assert!(matches!(result, Err(MailboxError::Closed)));
    }

    #[tokio::test]
    async fn test_close_returns_remaining_system_items() {
        let mb = mailbox(8);

        mb.post_system(SystemItem::Signal(SystemSignal::Stop));
        mb.post_system(SystemItem::Message(MessageEnvelope::new(
            TestMsg::SystemHalt,
        )));

        let (system, user) = mb.close();
        assert_eq!(system.len(), 2);
        assert!(user.is_empty());
        assert!(mb.is_closed());
    }

    #[tokio::test]
    async fn test_metrics_track_flow() {
        let mb = mailbox(8);

        mb.post_user(MessageEnvelope::new(TestMsg::User("a"))).await.unwrap();
        assert_eq!(mb.metrics().enqueued_count(), 1);

        mb.next_user().unwrap();
        assert_eq!(mb.metrics().dequeued_count(), 1);
    }
}
