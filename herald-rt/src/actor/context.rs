//! Per-actor context handed to every handler invocation.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
use super::props::Props;
use super::traits::Actor;
use crate::message::{Message, MessageEnvelope};
use crate::system::{ActorSystem, SystemError};
use crate::util::Pid;

/// Actor context: self pid, system handle, parent reference, children.
///
/// The context holds no parent or child objects, only pids; all navigation
/// goes through the owning [`ActorSystem`]. Handlers use it to send,
/// request, spawn children, watch peers, and stop themselves.
pub struct ActorContext<M: Message> {
    pid: Pid,
    parent: Option<Pid>,
    system: ActorSystem<M>,
    created_at: DateTime<Utc>,
}

impl<M: Message> ActorContext<M> {
    pub(crate) fn new(pid: Pid, parent: Option<Pid>, system: ActorSystem<M>) -> Self {
        Self {
            pid,
            parent,
            system,
            created_at: Utc::now(),
        }
    }

    /// This actor's pid.
    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    /// The supervising parent, if any.
    pub fn parent(&self) -> Option<&Pid> {
        self.parent.as_ref()
    }

    /// The owning system.
    pub fn system(&self) -> &ActorSystem<M> {
        &self.system
    }

    /// When this context was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Pids of this actor's children.
    pub fn children(&self) -> Vec<Pid> {
        self.system.children_of(&self.pid)
    }

    /// Send an envelope, stamping this actor as the sender.
    ///
    /// Sending to self enqueues for a future turn; the current turn is never
    /// re-entered.
    pub async fn send(
        &self,
        target: &Pid,
        mut envelope: MessageEnvelope<M>,
    ) -> Result<(), SystemError> {
        if envelope.sender.is_none() {
            envelope.sender = Some(self.pid.clone());
        }
        self.system.send(target, envelope).await
    }

    /// Convenience: wrap a payload and send it.
    pub async fn tell(&self, target: &Pid, payload: M) -> Result<(), SystemError> {
        self.send(target, MessageEnvelope::new(payload)).await
    }

    /// Issue a request and await the correlated reply.
    ///
    /// Requests made from this actor are cancelled if the actor stops while
    /// they are pending.
    pub async fn request(
        &self,
        target: &Pid,
        payload: M,
        timeout: Duration,
    ) -> Result<M, SystemError> {
        let envelope = MessageEnvelope::new(payload).with_sender(self.pid.clone());
        self.system
            .request_from(Some(self.pid.clone()), target, envelope, timeout)
            .await
    }

    /// Spawn a child supervised by this actor.
    pub async fn spawn_child<A>(&self, props: Props<A>) -> Result<Pid, SystemError>
    where
        A: Actor<Message = M>,
    {
        self.system
            .spawn_with_parent(props, Some(self.pid.clone()))
            .await
    }

    /// Register interest in another actor's termination.
    ///
    /// When the watched actor stops, this actor's `on_terminated` hook runs
    /// with the stopped pid.
    pub fn watch(&self, target: &Pid) {
        self.system.watch(self.pid.clone(), target);
    }

    /// Request this actor's own termination.
    ///
    /// The stop runs after the current turn completes; remaining user
    /// messages route to the dead-letter sink.
    pub fn stop_self(&self) {
        self.system.stop_detached(self.pid.clone());
    }

    /// Stop another actor (safe to call from inside a handler).
    pub fn stop(&self, target: &Pid) {
        self.system.stop_detached(target.clone());
    }
}
