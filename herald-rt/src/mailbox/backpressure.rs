//! Admission control for mailbox submission.
//!
//! The controller bounds the user-lane queue by size with dual watermarks
//! and a configurable full-queue strategy. Activation is hysteretic: the
//! backpressure flag turns on when the pending size crosses the high
//! watermark upward and turns off when it crosses the low watermark
//! downward, never flapping in between.

// Layer 1: Standard library imports
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};

// Layer 3: Internal module imports
use crate::message::{Message, MessageEnvelope};
use crate::util::serde_helpers::opt_duration_serde;
use crate::util::MessageId;

/// Default maximum pending queue size.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;

/// Default high watermark ratio.
pub const DEFAULT_HIGH_WATERMARK_RATIO: f64 = 0.8;

/// Default low watermark ratio.
pub const DEFAULT_LOW_WATERMARK_RATIO: f64 = 0.2;

/// Default initial queue allocation.
pub const DEFAULT_INITIAL_CAPACITY: usize = 64;

/// Dequeue discipline for the pending user-lane queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QueueKind {
    /// Strict FIFO.
    #[default]
    Default,

    /// Highest envelope priority first; FIFO within a priority level.
    Priority,
}

/// Strategy applied when a submit arrives at a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BackpressureStrategy {
    /// Reject the incoming envelope; the sender observes the rejection.
    DropNew,

    /// Evict the oldest pending envelope and accept the new one.
    DropOld,

    /// Fail the submit synchronously with a queue-full error.
    #[default]
    Throw,

    /// Suspend the sender until space frees or the wait timeout elapses.
    /// Waiters are woken in FIFO order as capacity frees.
    Wait,
}

impl fmt::Display for BackpressureStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropNew => write!(f, "DropNew"),
            Self::DropOld => write!(f, "DropOld"),
            Self::Throw => write!(f, "Throw"),
            Self::Wait => write!(f, "Wait"),
        }
    }
}

/// Which envelope a drop removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropKind {
    /// The incoming envelope was rejected (DropNew strategy)
    New,

    /// The oldest pending envelope was evicted (DropOld strategy)
    Old,

    /// A waiting submit timed out (Wait strategy)
    WaitTimeout,
}

impl fmt::Display for DropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Old => write!(f, "old"),
            Self::WaitTimeout => write!(f, "wait_timeout"),
        }
    }
}

/// Errors surfaced synchronously by `submit`.
#[derive(Error, Debug)]
pub enum BackpressureError {
    /// Queue at capacity under the Throw strategy
    #[error("queue full: size {size}, max {max}")]
    QueueFull {
        /// Pending size observed at submit time
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// The controller has been closed (actor stopped)
    #[error("backpressure controller closed")]
    Closed,
}

/// Outcome of a submit that did not fail synchronously.
#[derive(Debug)]
pub enum SubmitOutcome<M: Message> {
    /// Enqueued without displacement
    Accepted,

    /// Enqueued; the oldest pending envelope was evicted to make room
    AcceptedDroppedOldest(Box<MessageEnvelope<M>>),

    /// Not enqueued; the envelope is handed back for dead-letter routing
    Rejected {
        /// Why the envelope was rejected
        kind: DropKind,
        /// The rejected envelope
        envelope: Box<MessageEnvelope<M>>,
    },
}

impl<M: Message> SubmitOutcome<M> {
    /// True when the submitted envelope was enqueued.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, SubmitOutcome::Rejected { .. })
    }
}

/// State-change and drop notifications emitted by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackpressureEvent {
    /// Pending size crossed the high watermark upward
    Activated {
        /// Pending size at the crossing
        size: usize,
    },

    /// Pending size crossed the low watermark downward
    Deactivated {
        /// Pending size at the crossing
        size: usize,
    },

    /// An envelope was dropped
    Dropped {
        /// Drop category
        kind: DropKind,
        /// Identifier of the dropped envelope
        message_id: MessageId,
    },
}

/// Observer interface for backpressure state changes and drops.
pub trait BackpressureObserver: Send + Sync {
    /// Called synchronously for each emitted event. Implementations must not
    /// block.
    fn on_event(&self, event: &BackpressureEvent);
}

/// Configuration for one backpressure controller.
///
/// # Example
/// ```rust
/// use herald_rt::mailbox::{BackpressureConfig, BackpressureStrategy};
///
/// let config = BackpressureConfig {
///     max_queue_size: 64,
///     strategy: BackpressureStrategy::DropOld,
///     ..BackpressureConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackpressureConfig {
    /// Maximum number of pending (not yet dequeued) envelopes
    pub max_queue_size: usize,

    /// Activation threshold as a fraction of `max_queue_size`, in (0, 1]
    pub high_watermark_ratio: f64,

    /// Deactivation threshold as a fraction of `max_queue_size`, in
    /// (0, high_watermark_ratio)
    pub low_watermark_ratio: f64,

    /// Full-queue strategy
    pub strategy: BackpressureStrategy,

    /// Deadline for Wait-strategy submits; `None` waits indefinitely
    #[serde(with = "opt_duration_serde")]
    pub wait_timeout: Option<Duration>,

    /// Dequeue discipline for the pending queue
    pub queue_kind: QueueKind,

    /// Initial queue allocation
    pub initial_capacity: usize,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            high_watermark_ratio: DEFAULT_HIGH_WATERMARK_RATIO,
            low_watermark_ratio: DEFAULT_LOW_WATERMARK_RATIO,
            strategy: BackpressureStrategy::default(),
            wait_timeout: None,
            queue_kind: QueueKind::default(),
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl BackpressureConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be > 0".to_string());
        }
        if !(self.high_watermark_ratio > 0.0 && self.high_watermark_ratio <= 1.0) {
            return Err("high_watermark_ratio must be in (0, 1]".to_string());
        }
        if !(self.low_watermark_ratio > 0.0
            && self.low_watermark_ratio < self.high_watermark_ratio)
        {
            return Err("low_watermark_ratio must be in (0, high_watermark_ratio)".to_string());
        }
        Ok(())
    }

    fn high_threshold(&self) -> f64 {
        self.max_queue_size as f64 * self.high_watermark_ratio
    }

    fn low_threshold(&self) -> f64 {
        self.max_queue_size as f64 * self.low_watermark_ratio
    }
}

/// Queue state guarded by one lock.
///
/// The waiter list and the reservation count live with the queue so that a
/// freed slot can be promised to the oldest waiter in the same critical
/// section that frees it. Invariant: `queue.len() + reserved` never exceeds
/// `max_queue_size`, so a reservation is always redeemable.
struct PendingState<M: Message> {
    queue: VecDeque<MessageEnvelope<M>>,
    waiters: VecDeque<oneshot::Sender<()>>,
    /// Slots freed by `next` and promised to woken waiters, not yet redeemed
    reserved: usize,
}

impl<M: Message> PendingState<M> {
    /// Convert one freed slot into a reservation for the oldest live
    /// waiter. Waiters whose receiver is gone (timed out) are discarded.
    fn promise_slot(&mut self) {
        while let Some(tx) = self.waiters.pop_front() {
            if tx.send(()).is_ok() {
                self.reserved += 1;
                break;
            }
        }
    }
}

/// Bounded admission controller for one mailbox's user lane.
///
/// The controller owns the pending queue and the active set (envelopes
/// handed out by `next` but not yet completed). Size accounting:
/// `len() = pending + active`; the watermark comparisons and the capacity
/// bound apply to the pending queue only, so space frees as soon as a turn
/// dequeues.
pub struct BackpressureController<M: Message> {
    config: BackpressureConfig,
    pending: Mutex<PendingState<M>>,
    active: Mutex<HashSet<MessageId>>,
    backpressure_active: AtomicBool,
    observers: RwLock<Vec<Arc<dyn BackpressureObserver>>>,
    closed: AtomicBool,
}

impl<M: Message> BackpressureController<M> {
    /// Create a controller with the given configuration.
    pub fn new(config: BackpressureConfig) -> Self {
        let initial = config.initial_capacity.min(config.max_queue_size).max(1);
        Self {
            config,
            pending: Mutex::new(PendingState {
                queue: VecDeque::with_capacity(initial),
                waiters: VecDeque::new(),
                reserved: 0,
            }),
            active: Mutex::new(HashSet::new()),
            backpressure_active: AtomicBool::new(false),
            observers: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a state-change observer.
    pub fn add_observer(&self, observer: Arc<dyn BackpressureObserver>) {
        self.observers.write().push(observer);
    }

    /// The controller's configuration.
    pub fn config(&self) -> &BackpressureConfig {
        &self.config
    }

    /// Pending envelopes not yet handed out.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().queue.len()
    }

    /// Envelopes handed out but not yet completed.
    pub fn active_len(&self) -> usize {
        self.active.lock().len()
    }

    /// Total envelopes owned by the controller (pending + active).
    pub fn len(&self) -> usize {
        self.pending_len() + self.active_len()
    }

    /// True when no envelopes are pending or active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether backpressure is currently active.
    pub fn is_backpressure_active(&self) -> bool {
        self.backpressure_active.load(Ordering::Acquire)
    }

    /// Offer an envelope to the controller.
    ///
    /// Below capacity the envelope is enqueued (possibly activating
    /// backpressure); at capacity the configured strategy decides. Only the
    /// Throw strategy fails synchronously; every other path returns a
    /// [`SubmitOutcome`] the caller can observe.
    pub async fn submit(
        &self,
        mut envelope: MessageEnvelope<M>,
    ) -> Result<SubmitOutcome<M>, BackpressureError> {
        envelope.metadata.delivery_attempt += 1;

        let deadline = self.config.wait_timeout.map(|d| Instant::now() + d);
        let mut waited = false;

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(BackpressureError::Closed);
            }

            enum FullAction<M: Message> {
                DropNew(MessageEnvelope<M>),
                Throw(usize),
                Wait(MessageEnvelope<M>, oneshot::Receiver<()>),
            }

            let action = {
                let mut pending = self.pending.lock();
                let size = pending.queue.len();

                // A woken waiter redeems the slot promised to it; a fresh
                // arrival must also clear the outstanding reservations, so
                // it can never take a slot already promised to a waiter.
                // The `queue.len() + reserved <= max` invariant guarantees
                // that a redeeming waiter always finds room.
                let admissible = if waited {
                    size < self.config.max_queue_size
                } else {
                    size + pending.reserved < self.config.max_queue_size
                };

                if admissible {
                    if waited {
                        pending.reserved = pending.reserved.saturating_sub(1);
                    }
                    pending.queue.push_back(envelope);
                    let new_size = pending.queue.len();
                    drop(pending);
                    self.maybe_activate(new_size);
                    return Ok(SubmitOutcome::Accepted);
                }

                match self.config.strategy {
                    BackpressureStrategy::DropNew => FullAction::DropNew(envelope),
                    BackpressureStrategy::Throw => FullAction::Throw(size),
                    BackpressureStrategy::DropOld => {
                        // Only Wait creates reservations, so here
                        // size >= max >= 1 and the queue cannot be empty.
                        let evicted = pending.queue.pop_front();
                        pending.queue.push_back(envelope);
                        let new_size = pending.queue.len();
                        drop(pending);
                        self.maybe_activate(new_size);
                        return match evicted {
                            Some(old) => {
                                self.emit(&BackpressureEvent::Dropped {
                                    kind: DropKind::Old,
                                    message_id: old.message_id,
                                });
                                Ok(SubmitOutcome::AcceptedDroppedOldest(Box::new(old)))
                            }
                            None => Ok(SubmitOutcome::Accepted),
                        };
                    }
                    BackpressureStrategy::Wait => {
                        let (tx, rx) = oneshot::channel();
                        pending.waiters.push_back(tx);
                        FullAction::Wait(envelope, rx)
                    }
                }
            };

            match action {
                FullAction::DropNew(envelope) => {
                    self.emit(&BackpressureEvent::Dropped {
                        kind: DropKind::New,
                        message_id: envelope.message_id,
                    });
                    return Ok(SubmitOutcome::Rejected {
                        kind: DropKind::New,
                        envelope: Box::new(envelope),
                    });
                }
                FullAction::Throw(size) => {
                    return Err(BackpressureError::QueueFull {
                        size,
                        max: self.config.max_queue_size,
                    });
                }
                FullAction::Wait(held, mut rx) => {
                    let woken = match deadline {
                        Some(at) => {
                            tokio::select! {
                                biased;
                                result = &mut rx => result.is_ok(),
                                _ = sleep_until(at) => {
                                    // Refuse further wakes, then drain one
                                    // that may have landed as the deadline
                                    // fired; a drained wake carries a
                                    // reservation that must be redeemed,
                                    // not leaked.
                                    rx.close();
                                    if rx.try_recv().is_ok() {
                                        true
                                    } else {
                                        self.emit(&BackpressureEvent::Dropped {
                                            kind: DropKind::WaitTimeout,
                                            message_id: held.message_id,
                                        });
                                        return Ok(SubmitOutcome::Rejected {
                                            kind: DropKind::WaitTimeout,
                                            envelope: Box::new(held),
                                        });
                                    }
                                }
                            }
                        }
                        None => rx.await.is_ok(),
                    };

                    if !woken {
                        // Waiter sender dropped: the controller closed.
                        return Err(BackpressureError::Closed);
                    }

                    envelope = held;
                    waited = true;
                }
            }
        }
    }

    /// Pop the next pending envelope into the active set.
    ///
    /// FIFO by default; under the Priority discipline the highest envelope
    /// priority goes first (FIFO within a level). The freed slot is
    /// promised to the oldest waiter in the same critical section that
    /// frees it, so no other sender can observe it first; watermark
    /// hysteresis is checked after the pop.
    pub fn next(&self) -> Option<MessageEnvelope<M>> {
        let (envelope, remaining) = {
            let mut pending = self.pending.lock();
            let envelope = match self.config.queue_kind {
                QueueKind::Default => pending.queue.pop_front()?,
                QueueKind::Priority => {
                    let best = pending
                        .queue
                        .iter()
                        .enumerate()
                        .max_by_key(|(index, envelope)| {
                            // Earlier index wins ties, keeping FIFO per level.
                            (envelope.metadata.priority, std::cmp::Reverse(*index))
                        })
                        .map(|(index, _)| index)?;
                    pending.queue.remove(best)?
                }
            };
            pending.promise_slot();
            (envelope, pending.queue.len())
        };

        self.active.lock().insert(envelope.message_id);
        self.maybe_deactivate(remaining);

        Some(envelope)
    }

    /// Mark an active envelope as fully processed.
    ///
    /// Returns false if the id was not in the active set.
    pub fn complete(&self, id: &MessageId) -> bool {
        self.active.lock().remove(id)
    }

    /// Close the controller and drain the pending queue.
    ///
    /// Pending waiters observe `Closed`. The drained envelopes are handed
    /// back for dead-letter routing.
    pub fn close(&self) -> Vec<MessageEnvelope<M>> {
        self.closed.store(true, Ordering::Release);
        self.active.lock().clear();
        let mut pending = self.pending.lock();
        pending.waiters.clear();
        pending.reserved = 0;
        pending.queue.drain(..).collect()
    }

    /// Whether the controller has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn maybe_activate(&self, size: usize) {
        if size as f64 >= self.config.high_threshold()
            && !self.backpressure_active.swap(true, Ordering::AcqRel)
        {
            self.emit(&BackpressureEvent::Activated { size });
        }
    }

    fn maybe_deactivate(&self, size: usize) {
        if size as f64 <= self.config.low_threshold()
            && self.backpressure_active.swap(false, Ordering::AcqRel)
        {
            self.emit(&BackpressureEvent::Deactivated { size });
        }
    }

    fn emit(&self, event: &BackpressureEvent) {
        for observer in self.observers.read().iter() {
            observer.on_event(event);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use crate::message::MessagePriority;
    use parking_lot::Mutex as PlMutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct TestMsg(&'static str);

    impl Message for TestMsg {
        fn message_type(&self) -> &str {
            "test"
        }
    }

    fn controller(max: usize, strategy: BackpressureStrategy) -> BackpressureController<TestMsg> {
        BackpressureController::new(BackpressureConfig {
            max_queue_size: max,
            strategy,
            ..BackpressureConfig::default()
        })
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: PlMutex<Vec<BackpressureEvent>>,
    }

    impl BackpressureObserver for RecordingObserver {
        fn on_event(&self, event: &BackpressureEvent) {
            self.events.lock().push(event.clone());
        }
    }

    #[tokio::test]
    async fn test_submit_below_capacity() {
        let ctrl = controller(3, BackpressureStrategy::Throw);

        let outcome = ctrl.submit(MessageEnvelope::new(TestMsg("a"))).await.unwrap();
        assert!(outcome.is_accepted());
        assert_eq!(ctrl.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_drop_old_scenario() {
        // max=3, DropOld: A, B, C accepted; D accepted with A evicted;
        // next() four times yields B, C, D, nothing.
        let ctrl = controller(3, BackpressureStrategy::DropOld);
        let observer = Arc::new(RecordingObserver::default());
        ctrl.add_observer(Arc::clone(&observer) as Arc<dyn BackpressureObserver>);

        let a = MessageEnvelope::new(TestMsg("A"));
        let a_id = a.message_id;
        assert!(ctrl.submit(a).await.unwrap().is_accepted());
        assert!(ctrl
            .submit(MessageEnvelope::new(TestMsg("B")))
            .await
            .unwrap()
            .is_accepted());
        assert!(ctrl
            .submit(MessageEnvelope::new(TestMsg("C")))
            .await
            .unwrap()
            .is_accepted());

        let outcome = ctrl.submit(MessageEnvelope::new(TestMsg("D"))).await.unwrap();
        match outcome {
            SubmitOutcome::AcceptedDroppedOldest(old) => {
                assert_eq!(old.payload, TestMsg("A"));
            }
            other => panic!("expected AcceptedDroppedOldest, got {other:?}"),
        }

        assert_eq!(ctrl.next().unwrap().payload, TestMsg("B"));
        assert_eq!(ctrl.next().unwrap().payload, TestMsg("C"));
        assert_eq!(ctrl.next().unwrap().payload, TestMsg("D"));
        assert!(ctrl.next().is_none());

        let events = observer.events.lock();
        assert!(events.contains(&BackpressureEvent::Dropped {
            kind: DropKind::Old,
            message_id: a_id,
        }));
    }

    #[tokio::test]
    async fn test_drop_new_rejects_incoming() {
        let ctrl = controller(1, BackpressureStrategy::DropNew);

        assert!(ctrl
            .submit(MessageEnvelope::new(TestMsg("first")))
            .await
            .unwrap()
            .is_accepted());

        let outcome = ctrl
            .submit(MessageEnvelope::new(TestMsg("second")))
            .await
            .unwrap();
        match outcome {
            SubmitOutcome::Rejected { kind, envelope } => {
                assert_eq!(kind, DropKind::New);
                assert_eq!(envelope.payload, TestMsg("second"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        // The first message is untouched.
        assert_eq!(ctrl.next().unwrap().payload, TestMsg("first"));
    }

    #[tokio::test]
    async fn test_throw_fails_synchronously() {
        let ctrl = controller(1, BackpressureStrategy::Throw);

        ctrl.submit(MessageEnvelope::new(TestMsg("first"))).await.unwrap();

        let result = ctrl.submit(MessageEnvelope::new(TestMsg("second"))).await;
        match result {
            Err(BackpressureError::QueueFull { size, max }) => {
                assert_eq!(size, 1);
                assert_eq!(max, 1);
            }
            other => panic!("expected QueueFull, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_boundary_submit_at_max_minus_one_succeeds() {
        let ctrl = controller(2, BackpressureStrategy::Throw);

        ctrl.submit(MessageEnvelope::new(TestMsg("a"))).await.unwrap();
        // size = max - 1: must succeed (and may activate backpressure).
        let outcome = ctrl.submit(MessageEnvelope::new(TestMsg("b"))).await.unwrap();
        assert!(outcome.is_accepted());
        assert!(ctrl.is_backpressure_active());
    }

    #[tokio::test]
    async fn test_watermark_hysteresis() {
        let ctrl = BackpressureController::<TestMsg>::new(BackpressureConfig {
            max_queue_size: 10,
            high_watermark_ratio: 0.8,
            low_watermark_ratio: 0.2,
            strategy: BackpressureStrategy::Throw,
            ..BackpressureConfig::default()
        });
        let observer = Arc::new(RecordingObserver::default());
        ctrl.add_observer(Arc::clone(&observer) as Arc<dyn BackpressureObserver>);

        for i in 0..8 {
            ctrl.submit(MessageEnvelope::new(TestMsg("m"))).await.unwrap();
            let expect_active = i == 7;
            assert_eq!(ctrl.is_backpressure_active(), expect_active, "at size {}", i + 1);
        }

        // Drain down: deactivation fires only at size <= 2.
        for expected_remaining in (0..8).rev() {
            ctrl.next().unwrap();
            let expect_active = expected_remaining > 2;
            assert_eq!(
                ctrl.is_backpressure_active(),
                expect_active,
                "at remaining {expected_remaining}"
            );
        }

        let events = observer.events.lock();
        let activations = events
            .iter()
            .filter(|e| matches!(e, BackpressureEvent::Activated { .. }))
            .count();
        let deactivations = events
            .iter()
            .filter(|e| matches!(e, BackpressureEvent::Deactivated { .. }))
            .count();
        assert_eq!(activations, 1);
        assert_eq!(deactivations, 1);
    }

    #[tokio::test]
    async fn test_wait_strategy_resumes_when_capacity_frees() {
        let ctrl = Arc::new(BackpressureController::new(BackpressureConfig {
            max_queue_size: 1,
            strategy: BackpressureStrategy::Wait,
            wait_timeout: Some(Duration::from_secs(5)),
            ..BackpressureConfig::default()
        }));

        ctrl.submit(MessageEnvelope::new(TestMsg("first"))).await.unwrap();

        let ctrl_clone = Arc::clone(&ctrl);
        let waiter = tokio::spawn(async move {
            ctrl_clone
                .submit(MessageEnvelope::new(TestMsg("second")))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ctrl.next().unwrap().payload, TestMsg("first"));

        let outcome = waiter.await.unwrap().unwrap();
        assert!(outcome.is_accepted());
        assert_eq!(ctrl.next().unwrap().payload, TestMsg("second"));
    }

    #[tokio::test]
    async fn test_wait_strategy_times_out() {
        let ctrl = controller(1, BackpressureStrategy::Wait);
        let ctrl = BackpressureController::<TestMsg>::new(BackpressureConfig {
            wait_timeout: Some(Duration::from_millis(20)),
            ..ctrl.config().clone()
        });

        ctrl.submit(MessageEnvelope::new(TestMsg("first"))).await.unwrap();

        let outcome = ctrl.submit(MessageEnvelope::new(TestMsg("second"))).await.unwrap();
        match outcome {
            SubmitOutcome::Rejected { kind, .. } => assert_eq!(kind, DropKind::WaitTimeout),
            other => panic!("expected WaitTimeout rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wait_fifo_order() {
        let ctrl = Arc::new(BackpressureController::new(BackpressureConfig {
            max_queue_size: 1,
            strategy: BackpressureStrategy::Wait,
            wait_timeout: Some(Duration::from_secs(5)),
            ..BackpressureConfig::default()
        }));

        ctrl.submit(MessageEnvelope::new(TestMsg("seed"))).await.unwrap();

        let c1 = Arc::clone(&ctrl);
        let w1 = tokio::spawn(async move {
            c1.submit(MessageEnvelope::new(TestMsg("w1"))).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let c2 = Arc::clone(&ctrl);
        let w2 = tokio::spawn(async move {
            c2.submit(MessageEnvelope::new(TestMsg("w2"))).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Free one slot: the first waiter gets it.
        ctrl.next().unwrap();
        let o1 = w1.await.unwrap().unwrap();
        assert!(o1.is_accepted());

        // Free another: the second waiter follows.
        assert_eq!(ctrl.next().unwrap().payload, TestMsg("w1"));
        let o2 = w2.await.unwrap().unwrap();
        assert!(o2.is_accepted());
        assert_eq!(ctrl.next().unwrap().payload, TestMsg("w2"));
    }

    #[tokio::test]
    async fn test_freed_slot_is_reserved_for_the_waiter() {
        let ctrl = Arc::new(BackpressureController::new(BackpressureConfig {
            max_queue_size: 1,
            strategy: BackpressureStrategy::Wait,
            wait_timeout: Some(Duration::from_secs(5)),
            ..BackpressureConfig::default()
        }));

        ctrl.submit(MessageEnvelope::new(TestMsg("seed"))).await.unwrap();

        let c1 = Arc::clone(&ctrl);
        let waiter = tokio::spawn(async move {
            c1.submit(MessageEnvelope::new(TestMsg("waiter"))).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The pop promises the freed slot to the parked waiter before the
        // lock is released.
        assert_eq!(ctrl.next().unwrap().payload, TestMsg("seed"));

        // A fresh arrival cannot take the promised slot; it parks behind
        // the waiter instead.
        let c2 = Arc::clone(&ctrl);
        let fresh = tokio::spawn(async move {
            c2.submit(MessageEnvelope::new(TestMsg("fresh"))).await
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!fresh.is_finished(), "fresh sender must not steal the slot");

        let waiter_outcome = waiter.await.unwrap().unwrap();
        assert!(waiter_outcome.is_accepted());
        assert_eq!(ctrl.next().unwrap().payload, TestMsg("waiter"));

        let fresh_outcome = fresh.await.unwrap().unwrap();
        assert!(fresh_outcome.is_accepted());
        assert_eq!(ctrl.next().unwrap().payload, TestMsg("fresh"));
    }

    #[tokio::test]
    async fn test_complete_removes_from_active() {
        let ctrl = controller(4, BackpressureStrategy::Throw);

        ctrl.submit(MessageEnvelope::new(TestMsg("a"))).await.unwrap();
        let envelope = ctrl.next().unwrap();

        assert_eq!(ctrl.active_len(), 1);
        assert!(ctrl.complete(&envelope.message_id));
        assert_eq!(ctrl.active_len(), 0);
        assert!(!ctrl.complete(&envelope.message_id));
    }

    #[tokio::test]
    async fn test_close_drains_pending() {
        let ctrl = controller(4, BackpressureStrategy::Throw);

        ctrl.submit(MessageEnvelope::new(TestMsg("a"))).await.unwrap();
        ctrl.submit(MessageEnvelope::new(TestMsg("b"))).await.unwrap();

        let drained = ctrl.close();
        assert_eq!(drained.len(), 2);
        assert!(ctrl.is_closed());

        let result = ctrl.submit(MessageEnvelope::new(TestMsg("c"))).await;
        assert!(matches!(result, Err(BackpressureError::Closed)));
    }

    #[test]
    fn test_config_validation() {
        assert!(BackpressureConfig::default().validate().is_ok());

        let zero_max = BackpressureConfig {
            max_queue_size: 0,
            ..BackpressureConfig::default()
        };
        assert!(zero_max.validate().is_err());

        let inverted = BackpressureConfig {
            high_watermark_ratio: 0.2,
            low_watermark_ratio: 0.8,
            ..BackpressureConfig::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(BackpressureStrategy::DropNew.to_string(), "DropNew");
        assert_eq!(BackpressureStrategy::Wait.to_string(), "Wait");
        assert_eq!(DropKind::WaitTimeout.to_string(), "wait_timeout");
    }

    #[test]
    fn test_strategy_default_is_throw() {
        assert_eq!(BackpressureStrategy::default(), BackpressureStrategy::Throw);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Ranked(&'static str, MessagePriority);

    impl Message for Ranked {
        fn message_type(&self) -> &str {
            "ranked"
        }

        fn priority(&self) -> MessagePriority {
            self.1
        }
    }

    #[tokio::test]
    async fn test_priority_queue_dequeues_highest_first() {
        let ctrl = BackpressureController::new(BackpressureConfig {
            max_queue_size: 8,
            queue_kind: QueueKind::Priority,
            ..BackpressureConfig::default()
        });

        for envelope in [
            Ranked("low", MessagePriority::Low),
            Ranked("normal-1", MessagePriority::Normal),
            Ranked("high", MessagePriority::High),
            Ranked("normal-2", MessagePriority::Normal),
        ] {
            ctrl.submit(MessageEnvelope::new(envelope)).await.unwrap();
        }

        let order: Vec<&str> = std::iter::from_fn(|| ctrl.next())
            .map(|e| e.payload.0)
            .collect();
        assert_eq!(order, vec!["high", "normal-1", "normal-2", "low"]);
    }
}
