//! # herald-rt - In-Process Actor Runtime
//!
//! Message-passing runtime for building concurrent applications as networks
//! of actors with isolated state, one-at-a-time message processing, and
//! supervision. Aimed at server-side workloads—request dispatch, event
//! processing, worker-pool coordination—where correctness under concurrency
//! and controlled throughput matter more than raw sequential speed.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use herald_rt::prelude::*;
//!
//! // 1. Define the system's message type
//! #[derive(Debug, Clone)]
//! enum CounterMsg {
//!     Increment,
//!     Boom,
//! }
//!
//! impl Message for CounterMsg {
//!     fn message_type(&self) -> &str {
//!         match self {
//!             CounterMsg::Increment => "counter.increment",
//!             CounterMsg::Boom => "counter.boom",
//!         }
//!     }
//! }
//!
//! // 2. Define an actor
//! struct CounterActor {
//!     count: u64,
//! }
//!
//! #[async_trait]
//! impl Actor for CounterActor {
//!     type Message = CounterMsg;
//!     type Error = std::io::Error;
//!
//!     async fn receive(
//!         &mut self,
//!         envelope: MessageEnvelope<Self::Message>,
//!         _ctx: &mut ActorContext<Self::Message>,
//!     ) -> Result<(), Self::Error> {
//!         match envelope.payload {
//!             CounterMsg::Increment => {
//!                 self.count += 1;
//!                 Ok(())
//!             }
//!             CounterMsg::Boom => Err(std::io::Error::other("boom")),
//!         }
//!     }
//! }
//!
//! // 3. Spawn and send
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let system = ActorSystem::new(SystemConfig::default());
//!     let pid = system.spawn(Props::new(|| CounterActor { count: 0 })).await?;
//!
//!     system.send(&pid, MessageEnvelope::new(CounterMsg::Increment)).await?;
//!
//!     system.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Core Pieces
//!
//! - [`message`] - The [`Message`](message::Message) trait, envelopes with
//!   correlation/causation/TTL metadata, and system-lane selection
//! - [`mailbox`] - Two-lane single-consumer mailboxes with watermark-based
//!   backpressure ([`BackpressureController`](mailbox::BackpressureController))
//! - [`dispatch`] - Turn scheduling: a basic dispatcher and a
//!   class-partitioned layered dispatcher with adaptive concurrency
//! - [`actor`] - The [`Actor`](actor::Actor) trait, lifecycle hooks, spawn
//!   [`Props`](actor::Props), and the per-actor context
//! - [`supervisor`] - Failure directives (Resume/Restart/Stop/Escalate) and
//!   restart rate limiting
//! - [`router`] - Round-robin, random, broadcast, consistent-hash, and
//!   weighted routing over routee sets
//! - [`pipeline`] - Middleware interception on send/receive/dead-letter/error
//!   paths and the resolved-target cache
//! - [`store`] - Pluggable persistence (in-memory and file-backed) for
//!   delivery-state bookkeeping
//! - [`system`] - The [`ActorSystem`](system::ActorSystem): registry,
//!   spawn/stop/send/broadcast/request, dead letters, shutdown
//!
//! # Processing Model
//!
//! Actors run on dispatcher-scheduled turns. A turn drains the mailbox's
//! system lane first, then up to a budget of user messages; within an actor
//! everything is sequential, across actors turns run in parallel. Local
//! delivery preserves FIFO order per sender-receiver pair. Handler errors
//! never cross the actor boundary: the supervisor strategy maps each
//! failure to Resume, Restart, Stop, or Escalate.

pub mod actor;
pub mod dispatch;
pub mod mailbox;
pub mod message;
pub mod pipeline;
pub mod router;
pub mod store;
pub mod supervisor;
pub mod system;
pub mod util;

// Re-export commonly used types
pub use actor::{Actor, ActorContext, ActorLifecycle, ActorState, Props};
pub use dispatch::{
    BasicDispatcher, BasicDispatcherConfig, DispatchError, DispatchTask, Dispatcher,
    LayeredDispatcher, LayeredDispatcherConfig, TaskClass, TaskPriority,
};
pub use mailbox::{
    AtomicMetrics, BackpressureConfig, BackpressureController, BackpressureEvent,
    BackpressureObserver, BackpressureStrategy, DropKind, Mailbox, MailboxError, MetricsRecorder,
    QueueKind, SubmitOutcome,
};
pub use message::{Message, MessageEnvelope, MessageMetadata, MessagePriority};
pub use pipeline::{ChainOutcome, Middleware, MiddlewareChain, MiddlewareDecision};
pub use router::{RouteSelection, Routee, Router, RouterError, RouterStrategy};
pub use store::{DeliveryState, FileMessageStore, InMemoryMessageStore, MessageStore, StoreError};
pub use supervisor::{
    AlwaysEscalate, AlwaysRestart, AlwaysResume, AlwaysStop, Directive, Failure, RestartBackoff,
    SupervisorStrategy,
};
pub use system::{
    ActorFactory, ActorSystem, DeadLetter, DeadLetterReason, DeadLetterSink, DispatcherKind,
    HandlerId, MessageHandler, SystemConfig, SystemError, SystemMetricsSnapshot, TransportAdapter,
};
pub use util::{ActorId, MessageId, Pid};

/// Convenience re-exports for the common path.
pub mod prelude {
    pub use crate::actor::{Actor, ActorContext, Props};
    pub use crate::message::{Message, MessageEnvelope, MessagePriority};
    pub use crate::supervisor::{Directive, Failure, SupervisorStrategy};
    pub use crate::system::{ActorSystem, SystemConfig, SystemError};
    pub use crate::util::Pid;
}
