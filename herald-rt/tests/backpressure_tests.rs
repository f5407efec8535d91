//! End-to-end backpressure behavior through the system send path.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

use herald_rt::actor::{Actor, ActorContext, Props};
use herald_rt::mailbox::{BackpressureConfig, BackpressureStrategy, DropKind};
use herald_rt::message::{Message, MessageEnvelope};
use herald_rt::system::{ActorSystem, DeadLetterReason, SystemConfig, SystemError};

#[derive(Debug, Clone)]
enum SlowMsg {
    /// Parks the actor until the gate opens.
    Block,
    /// Plain payload recorded on receipt.
    Data(u64),
}

impl Message for SlowMsg {
    fn message_type(&self) -> &str {
        match self {
            SlowMsg::Block => "slow.block",
            SlowMsg::Data(_) => "slow.data",
        }
    }
}

struct SlowActor {
    entered: Arc<Notify>,
    gate: Arc<Semaphore>,
    seen: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl Actor for SlowActor {
    type Message = SlowMsg;
    type Error = std::io::Error;

    async fn receive(
        &mut self,
        envelope: MessageEnvelope<Self::Message>,
        _ctx: &mut ActorContext<Self::Message>,
    ) -> Result<(), Self::Error> {
        match envelope.payload {
            SlowMsg::Block => {
                self.entered.notify_one();
                let _permit = self.gate.acquire().await;
                Ok(())
            }
            SlowMsg::Data(v) => {
                self.seen.lock().push(v);
                Ok(())
            }
        }
    }
}

struct Fixture {
    system: ActorSystem<SlowMsg>,
    pid: herald_rt::util::Pid,
    gate: Arc<Semaphore>,
    seen: Arc<Mutex<Vec<u64>>>,
}

/// Spawn a slow actor behind a tiny queue and park it on a Block message,
/// so subsequent sends exercise the full-queue strategy.
async fn blocked_fixture(max_queue_size: usize, strategy: BackpressureStrategy) -> Fixture {
    let system = ActorSystem::new(SystemConfig::default());
    let entered = Arc::new(Notify::new());
    let gate = Arc::new(Semaphore::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (entered_c, gate_c, seen_c) = (Arc::clone(&entered), Arc::clone(&gate), Arc::clone(&seen));
    let props = Props::new(move || SlowActor {
        entered: Arc::clone(&entered_c),
        gate: Arc::clone(&gate_c),
        seen: Arc::clone(&seen_c),
    })
    .with_backpressure(BackpressureConfig {
        max_queue_size,
        strategy,
        ..BackpressureConfig::default()
    })
    // One message per turn keeps queue contents observable between turns.
    .with_throughput(1);

    let pid = system.spawn(props).await.expect("spawn");
    system
        .send(&pid, MessageEnvelope::new(SlowMsg::Block))
        .await
        .expect("send block");
    // The handler is now parked inside its turn; the pending queue is empty.
    entered.notified().await;

    Fixture {
        system,
        pid,
        gate,
        seen,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn drop_new_rejects_and_dead_letters_the_incoming() {
    let fixture = blocked_fixture(1, BackpressureStrategy::DropNew).await;

    fixture
        .system
        .send(&fixture.pid, MessageEnvelope::new(SlowMsg::Data(1)))
        .await
        .expect("first data fits");

    let result = fixture
        .system
        .send(&fixture.pid, MessageEnvelope::new(SlowMsg::Data(2)))
        .await;
    match result {
        Err(SystemError::MessageDropped { kind }) => assert_eq!(kind, DropKind::New),
        other => panic!("expected MessageDropped, got {other:?}"),
    }
    assert_eq!(
        fixture
            .system
            .dead_letters()
            .count(DeadLetterReason::BackpressureDrop),
        1
    );

    fixture.gate.add_permits(8);
    wait_until(|| fixture.seen.lock().as_slice() == [1]).await;
    fixture.system.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn drop_old_evicts_the_oldest_pending() {
    let fixture = blocked_fixture(1, BackpressureStrategy::DropOld).await;

    fixture
        .system
        .send(&fixture.pid, MessageEnvelope::new(SlowMsg::Data(1)))
        .await
        .expect("first data fits");
    // Queue full: this send evicts Data(1) and takes its place.
    fixture
        .system
        .send(&fixture.pid, MessageEnvelope::new(SlowMsg::Data(2)))
        .await
        .expect("drop-old accepts the new envelope");

    assert_eq!(
        fixture
            .system
            .dead_letters()
            .count(DeadLetterReason::BackpressureDrop),
        1
    );

    fixture.gate.add_permits(8);
    wait_until(|| fixture.seen.lock().as_slice() == [2]).await;
    fixture.system.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn throw_surfaces_queue_full_to_the_sender() {
    let fixture = blocked_fixture(1, BackpressureStrategy::Throw).await;

    fixture
        .system
        .send(&fixture.pid, MessageEnvelope::new(SlowMsg::Data(1)))
        .await
        .expect("first data fits");

    let result = fixture
        .system
        .send(&fixture.pid, MessageEnvelope::new(SlowMsg::Data(2)))
        .await;
    match result {
        Err(SystemError::QueueFull { size, max }) => {
            assert_eq!(size, 1);
            assert_eq!(max, 1);
        }
        other => panic!("expected QueueFull, got {other:?}"),
    }
    // Throw surfaces synchronously; nothing went to dead letters.
    assert_eq!(
        fixture
            .system
            .dead_letters()
            .count(DeadLetterReason::BackpressureDrop),
        0
    );

    fixture.gate.add_permits(8);
    wait_until(|| fixture.seen.lock().as_slice() == [1]).await;
    fixture.system.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn wait_strategy_suspends_the_sender_until_space_frees() {
    let fixture = blocked_fixture(1, BackpressureStrategy::Wait).await;

    fixture
        .system
        .send(&fixture.pid, MessageEnvelope::new(SlowMsg::Data(1)))
        .await
        .expect("first data fits");

    // This send suspends until the parked turn finishes and dequeues.
    let system = fixture.system.clone();
    let pid = fixture.pid.clone();
    let waiter = tokio::spawn(async move {
        system
            .send(&pid, MessageEnvelope::new(SlowMsg::Data(2)))
            .await
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!waiter.is_finished(), "sender should be suspended");

    fixture.gate.add_permits(8);
    waiter
        .await
        .expect("join")
        .expect("suspended send completes");

    wait_until(|| fixture.seen.lock().as_slice() == [1, 2]).await;
    fixture.system.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn queued_messages_for_a_stopped_actor_become_dead_letters() {
    let fixture = blocked_fixture(8, BackpressureStrategy::Throw).await;

    for v in 1..=4 {
        fixture
            .system
            .send(&fixture.pid, MessageEnvelope::new(SlowMsg::Data(v)))
            .await
            .expect("queue data");
    }

    // Stop while the handler is parked; the queued messages never run.
    let stopper = {
        let system = fixture.system.clone();
        let pid = fixture.pid.clone();
        tokio::spawn(async move { system.stop(&pid).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    fixture.gate.add_permits(8);
    stopper.await.expect("join").expect("stop");

    let stopped = fixture
        .system
        .dead_letters()
        .count(DeadLetterReason::ActorStopped);
    let processed = fixture.seen.lock().len() as u64;
    assert_eq!(stopped + processed, 4, "every queued message is accounted for");
    assert!(stopped >= 1, "at least one message was dead-lettered");

    fixture.system.shutdown().await.expect("shutdown");
}
