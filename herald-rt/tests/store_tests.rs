//! Delivery-state bookkeeping with an attached message store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use herald_rt::actor::{Actor, ActorContext, Props};
use herald_rt::message::{Message, MessageEnvelope};
use herald_rt::store::{DeliveryState, FileMessageStore, InMemoryMessageStore, MessageStore};
use herald_rt::system::{ActorSystem, SystemConfig};
use herald_rt::util::Pid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Job {
    id: u64,
}

impl Message for Job {
    fn message_type(&self) -> &str {
        "job"
    }
}

struct JobActor {
    processed: Arc<AtomicU64>,
}

#[async_trait]
impl Actor for JobActor {
    type Message = Job;
    type Error = std::io::Error;

    async fn receive(
        &mut self,
        _envelope: MessageEnvelope<Self::Message>,
        _ctx: &mut ActorContext<Self::Message>,
    ) -> Result<(), Self::Error> {
        self.processed.fetch_add(1, Ordering::SeqCst);
        Ok(())
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
async fn attached_store_tracks_delivery_states() {
    let system = ActorSystem::new(SystemConfig::default());
    let store = Arc::new(InMemoryMessageStore::<Job>::new());
    system.set_store(Arc::clone(&store) as Arc<dyn MessageStore<Job>>);

    let processed = Arc::new(AtomicU64::new(0));
    let processed_clone = Arc::clone(&processed);
    let pid = system
        .spawn(Props::new(move || JobActor {
            processed: Arc::clone(&processed_clone),
        }))
        .await
        .expect("spawn");

    let envelope = MessageEnvelope::new(Job { id: 1 });
    let message_id = envelope.message_id;
    system.send(&pid, envelope).await.expect("send");

    wait_until(|| processed.load(Ordering::SeqCst) == 1).await;

    // The turn advanced the record through Sent to Delivered.
    let mut status = None;
    for _ in 0..300 {
        status = store.get_status(&message_id).await.expect("status");
        if status == Some(DeliveryState::Delivered) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, Some(DeliveryState::Delivered));

    // Acknowledgement is the application's call, through the interface.
    store
        .mark_as_acknowledged(&message_id)
        .await
        .expect("acknowledge");
    assert_eq!(
        store.get_status(&message_id).await.expect("status"),
        Some(DeliveryState::Acknowledged)
    );
    assert!(store
        .get_unacknowledged(&pid)
        .await
        .expect("unacked")
        .is_empty());

    system.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn file_store_round_trips_through_the_system() {
    let dir = tempfile::tempdir().expect("tempdir");
    let system = ActorSystem::new(SystemConfig::default());
    let store = Arc::new(
        FileMessageStore::<Job>::open(dir.path())
            .await
            .expect("open store"),
    );
    system.set_store(Arc::clone(&store) as Arc<dyn MessageStore<Job>>);

    let processed = Arc::new(AtomicU64::new(0));
    let processed_clone = Arc::clone(&processed);
    let pid = system
        .spawn(Props::new(move || JobActor {
            processed: Arc::clone(&processed_clone),
        }))
        .await
        .expect("spawn");

    let envelope = MessageEnvelope::new(Job { id: 9 });
    let message_id = envelope.message_id;
    system.send(&pid, envelope).await.expect("send");
    wait_until(|| processed.load(Ordering::SeqCst) == 1).await;
    system.shutdown().await.expect("shutdown");

    // A reopened store still knows the envelope and its state.
    let reopened = FileMessageStore::<Job>::open(dir.path())
        .await
        .expect("reopen");
    let loaded = reopened
        .get(&message_id)
        .await
        .expect("get")
        .expect("record exists");
    assert_eq!(loaded.payload.id, 9);

    let status = reopened.get_status(&message_id).await.expect("status");
    assert!(
        status == Some(DeliveryState::Sent) || status == Some(DeliveryState::Delivered),
        "unexpected status {status:?}"
    );
}

#[tokio::test]
async fn unacknowledged_envelopes_are_queryable_per_receiver() {
    let store = InMemoryMessageStore::<Job>::new();
    let receiver = Pid::local();
    let other = Pid::local();

    let e1 = MessageEnvelope::new(Job { id: 1 }).with_receiver(receiver.clone());
    let e2 = MessageEnvelope::new(Job { id: 2 }).with_receiver(other.clone());
    store.save(&e1).await.expect("save");
    store.save(&e2).await.expect("save");

    let unacked = store.get_unacknowledged(&receiver).await.expect("query");
    assert_eq!(unacked.len(), 1);
    assert_eq!(unacked[0].payload.id, 1);
}
