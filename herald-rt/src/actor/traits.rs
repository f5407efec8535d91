//! Core Actor trait.
//!
//! The runtime asks nothing of an actor beyond `receive` and the optional
//! lifecycle hooks. Concrete actors are constructed by the factory carried
//! in [`Props`](super::props::Props); behavior switching is expressed as a
//! tagged state inside the actor, dispatched by its own `match`.

// Layer 1: Standard library imports
use std::error::Error;

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::context::ActorContext;
use crate::message::{Message, MessageEnvelope};
use crate::supervisor::Failure;
use crate::util::Pid;

/// A unit of concurrency with private state and a mailbox.
///
/// # Associated Types
///
/// - `Message`: the system-wide message type this actor handles
/// - `Error`: the error type returned by handlers and hooks
///
/// # Processing Discipline
///
/// At most one behavior executes per actor at any time: `receive` is invoked
/// message by message from the actor's own turn, never concurrently.
/// Handlers run to completion (including awaited suspension points) before
/// the next message begins, and must never block a thread indefinitely.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use herald_rt::actor::{Actor, ActorContext};
/// use herald_rt::message::{Message, MessageEnvelope};
///
/// #[derive(Debug, Clone)]
/// enum CounterMsg {
///     Increment,
///     Reset,
/// }
///
/// impl Message for CounterMsg {
///     fn message_type(&self) -> &str {
///         match self {
///             CounterMsg::Increment => "counter.increment",
///             CounterMsg::Reset => "counter.reset",
///         }
///     }
/// }
///
/// struct CounterActor {
///     count: u64,
/// }
///
/// #[async_trait]
/// impl Actor for CounterActor {
///     type Message = CounterMsg;
///     type Error = std::io::Error;
///
///     async fn receive(
///         &mut self,
///         envelope: MessageEnvelope<Self::Message>,
///         _ctx: &mut ActorContext<Self::Message>,
///     ) -> Result<(), Self::Error> {
///         match envelope.payload {
///             CounterMsg::Increment => self.count += 1,
///             CounterMsg::Reset => self.count = 0,
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Actor: Send + 'static {
    /// The system-wide message type.
    type Message: Message;

    /// The error type returned by handlers and hooks.
    type Error: Error + Send + Sync + 'static;

    /// Handle one envelope.
    ///
    /// An error here does not cross the actor boundary: the supervisor
    /// strategy turns it into a directive (Resume, Restart, Stop, or
    /// Escalate).
    async fn receive(
        &mut self,
        envelope: MessageEnvelope<Self::Message>,
        ctx: &mut ActorContext<Self::Message>,
    ) -> Result<(), Self::Error>;

    /// Hook run inside spawn, before any message is processed.
    ///
    /// A failure here aborts the spawn: the actor is removed before the
    /// error surfaces to the caller as a start failure.
    async fn pre_start(
        &mut self,
        _ctx: &mut ActorContext<Self::Message>,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Hook run when the actor stops, after the system lane has drained.
    ///
    /// A failure here is logged; the actor still stops.
    async fn post_stop(
        &mut self,
        _ctx: &mut ActorContext<Self::Message>,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Hook run on the failing instance before a supervisor-directed
    /// restart replaces it.
    async fn pre_restart(
        &mut self,
        _cause: &Failure,
        _ctx: &mut ActorContext<Self::Message>,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Hook run on the fresh instance after a restart.
    async fn post_restart(
        &mut self,
        _cause: &Failure,
        _ctx: &mut ActorContext<Self::Message>,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Notification that a watched actor terminated.
    async fn on_terminated(&mut self, _pid: &Pid, _ctx: &mut ActorContext<Self::Message>) {}
}
