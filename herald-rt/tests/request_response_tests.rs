//! Request/response correlation across the runtime.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use herald_rt::actor::{Actor, ActorContext, Props};
use herald_rt::message::{Message, MessageEnvelope};
use herald_rt::system::{ActorSystem, SystemConfig};

#[derive(Debug, Clone, PartialEq)]
enum EchoMsg {
    Echo { v: u64 },
    EchoReply { v: u64 },
}

impl Message for EchoMsg {
    fn message_type(&self) -> &str {
        match self {
            EchoMsg::Echo { .. } => "echo",
            EchoMsg::EchoReply { .. } => "echo.reply",
        }
    }
}

/// Echoes every request; keeps the last request envelope so tests can send
/// duplicate responses by hand.
struct EchoActor {
    handled: Arc<AtomicU64>,
    last_request: Arc<Mutex<Option<MessageEnvelope<EchoMsg>>>>,
}

#[async_trait]
impl Actor for EchoActor {
    type Message = EchoMsg;
    type Error = std::io::Error;

    async fn receive(
        &mut self,
        envelope: MessageEnvelope<Self::Message>,
        ctx: &mut ActorContext<Self::Message>,
    ) -> Result<(), Self::Error> {
        if let EchoMsg::Echo { v } = &envelope.payload {
            self.handled.fetch_add(1, Ordering::SeqCst);
            let response = MessageEnvelope::response_to(&envelope, EchoMsg::EchoReply { v: *v });
            *self.last_request.lock() = Some(envelope.clone());
            if let Some(target) = response.receiver.clone() {
                let _ = ctx.system().send(&target, response).await;
            }
        }
        Ok(())
    }
}

fn echo_props(
    handled: &Arc<AtomicU64>,
    last_request: &Arc<Mutex<Option<MessageEnvelope<EchoMsg>>>>,
) -> Props<EchoActor> {
    let handled = Arc::clone(handled);
    let last_request = Arc::clone(last_request);
    Props::new(move || EchoActor {
        handled: Arc::clone(&handled),
        last_request: Arc::clone(&last_request),
    })
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
async fn request_resolves_with_response_payload() {
    let system = ActorSystem::new(SystemConfig::default());
    let handled = Arc::new(AtomicU64::new(0));
    let last_request = Arc::new(Mutex::new(None));
    let pid = system
        .spawn(echo_props(&handled, &last_request))
        .await
        .expect("spawn");

    let reply = system
        .request(
            &pid,
            MessageEnvelope::new(EchoMsg::Echo { v: 5 }),
            Duration::from_secs(1),
        )
        .await
        .expect("request");

    assert_eq!(reply, EchoMsg::EchoReply { v: 5 });
    assert_eq!(system.pending_request_count(), 0);

    // The envelope the responder saw carried request metadata.
    let request = last_request.lock().clone().expect("request recorded");
    assert!(request.metadata.is_request);
    assert!(request.metadata.correlation_id.is_some());
    assert!(request.metadata.reply_to.is_some());

    system.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn second_response_with_same_correlation_is_dropped() {
    let system = ActorSystem::new(SystemConfig::default());
    let handled = Arc::new(AtomicU64::new(0));
    let last_request = Arc::new(Mutex::new(None));
    let pid = system
        .spawn(echo_props(&handled, &last_request))
        .await
        .expect("spawn");

    let reply = system
        .request(
            &pid,
            MessageEnvelope::new(EchoMsg::Echo { v: 7 }),
            Duration::from_secs(1),
        )
        .await
        .expect("request");
    assert_eq!(reply, EchoMsg::EchoReply { v: 7 });

    // Replay the response by hand: the correlation id is gone and the
    // synthetic reply-to pid is unregistered, so it drops silently.
    let request = last_request.lock().clone().expect("request recorded");
    let duplicate = MessageEnvelope::response_to(&request, EchoMsg::EchoReply { v: 7 });
    let target = duplicate.receiver.clone().expect("reply target");
    let dead_before = system.dead_letters().total_count();

    system
        .send(&target, duplicate)
        .await
        .expect("late response send is silent");

    assert_eq!(system.dead_letters().total_count(), dead_before);
    assert_eq!(system.pending_request_count(), 0);

    system.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn request_with_zero_timeout_rejects_but_still_sends() {
    let system = ActorSystem::new(SystemConfig::default());
    let handled = Arc::new(AtomicU64::new(0));
    let last_request = Arc::new(Mutex::new(None));
    let pid = system
        .spawn(echo_props(&handled, &last_request))
        .await
        .expect("spawn");

    let dead_before = system.dead_letters().total_count();
    let result = system
        .request(
            &pid,
            MessageEnvelope::new(EchoMsg::Echo { v: 1 }),
            Duration::ZERO,
        )
        .await;

    assert!(matches!(
        result,
        Err(herald_rt::system::SystemError::RequestTimeout(_))
    ));

    // The envelope still went out on the normal path and was processed.
    wait_until(|| handled.load(Ordering::SeqCst) == 1).await;
    assert_eq!(system.dead_letters().total_count(), dead_before);
    assert_eq!(system.pending_request_count(), 0);

    system.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn timed_out_request_sees_exactly_one_outcome() {
    let system = ActorSystem::new(SystemConfig::default());
    let handled = Arc::new(AtomicU64::new(0));
    let last_request = Arc::new(Mutex::new(None));
    let pid = system
        .spawn(echo_props(&handled, &last_request))
        .await
        .expect("spawn");

    // A request the actor ignores (reply arrives only for Echo).
    let result = system
        .request(
            &pid,
            MessageEnvelope::new(EchoMsg::EchoReply { v: 0 }),
            Duration::from_millis(50),
        )
        .await;

    assert!(matches!(
        result,
        Err(herald_rt::system::SystemError::RequestTimeout(_))
    ));
    assert_eq!(system.pending_request_count(), 0);

    system.shutdown().await.expect("shutdown");
}
