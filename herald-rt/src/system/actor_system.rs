//! Main actor system: root registry and library surface.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::StreamExt;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::cell::{ActorCell, CellState, TurnRunner};
use super::config::{DispatcherKind, SystemConfig};
use super::dead_letter::{DeadLetterReason, DeadLetterSink};
use super::errors::SystemError;
use super::requests::{PendingRequests, RequestOutcome};
use super::transport::TransportAdapter;
use crate::actor::{Actor, ActorContext, ActorLifecycle, Props};
use crate::dispatch::{BasicDispatcher, Dispatcher, LayeredDispatcher, TaskClass, TaskPriority};
use crate::mailbox::{BackpressureError, Mailbox, MailboxError, MetricsRecorder, SubmitOutcome};
use crate::message::{
    is_system_message_type, Message, MessageEnvelope, SystemItem, SystemSignal,
};
use crate::pipeline::{
    group_by_target, ChainOutcome, Middleware, MiddlewareChain, ResolvedTarget, TargetCache,
    DEFAULT_MAX_CONCURRENT_BATCHES, DIRECT_SEND_THRESHOLD,
};
use crate::store::{DeliveryState, MessageStore};
use crate::util::{ActorId, Pid};

/// System state enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SystemState {
    /// System is running normally
    Running,
    /// Graceful shutdown in progress
    ShuttingDown,
    /// System has stopped
    Stopped,
}

/// Handle returned by `add_message_handler`, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Observation hook invoked for every delivery and broadcast.
///
/// Any `Fn(&MessageEnvelope<M>)` closure qualifies.
pub trait MessageHandler<M: Message>: Send + Sync {
    /// Observe one envelope. Must not block.
    fn on_message(&self, envelope: &MessageEnvelope<M>);
}

impl<M, F> MessageHandler<M> for F
where
    M: Message,
    F: Fn(&MessageEnvelope<M>) + Send + Sync,
{
    fn on_message(&self, envelope: &MessageEnvelope<M>) {
        self(envelope)
    }
}

/// Named actor factory, registered for spawn-by-class-name (the entry point
/// a transport adapter uses for remote spawn requests).
#[async_trait]
pub trait ActorFactory<M: Message>: Send + Sync {
    /// Spawn one instance into the given system.
    async fn spawn(&self, system: &ActorSystem<M>) -> Result<Pid, SystemError>;
}

#[async_trait]
impl<A: Actor> ActorFactory<A::Message> for Props<A> {
    async fn spawn(&self, system: &ActorSystem<A::Message>) -> Result<Pid, SystemError> {
        system.spawn(self.clone()).await
    }
}

/// Aggregate counters the core publishes.
#[derive(Debug, Clone, Serialize)]
pub struct SystemMetricsSnapshot {
    /// Registered actors
    pub actors: usize,

    /// Envelopes enqueued across all mailboxes
    pub messages_enqueued: u64,

    /// Envelopes dequeued across all mailboxes
    pub messages_dequeued: u64,

    /// Envelopes dropped across all mailboxes
    pub messages_dropped: u64,

    /// Envelopes captured by the dead-letter sink
    pub dead_letters: u64,

    /// Requests awaiting a response
    pub pending_requests: usize,
}

/// Internal actor registration.
struct ActorEntry<M: Message> {
    pid: Pid,
    name: Option<String>,
    mailbox: Mailbox<M>,
    runner: Arc<dyn TurnRunner>,
    parent: Option<Pid>,
    children: RwLock<Vec<Pid>>,
    #[allow(dead_code)] // reserved for registry introspection
    spawned_at: DateTime<Utc>,
}

/// The process-wide actor container.
///
/// Cloning an `ActorSystem` clones a cheap handle to the same system. All
/// shared state is mutated through spawn/stop; concurrent readers go
/// through lock-free maps.
///
/// # Example
///
/// ```rust,ignore
/// let system = ActorSystem::new(SystemConfig::default());
/// let pid = system.spawn(Props::new(|| CounterActor { count: 0 })).await?;
/// system.send(&pid, MessageEnvelope::new(CounterMsg::Increment)).await?;
/// system.shutdown().await?;
/// ```
pub struct ActorSystem<M: Message> {
    inner: Arc<SystemInner<M>>,
}

impl<M: Message> Clone for ActorSystem<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SystemInner<M: Message> {
    config: SystemConfig,
    entries: DashMap<ActorId, ActorEntry<M>>,
    names: DashMap<String, Pid>,
    dead_letters: DeadLetterSink<M>,
    pending: PendingRequests<M>,
    middleware: MiddlewareChain<M>,
    handlers: RwLock<Vec<(HandlerId, Arc<dyn MessageHandler<M>>)>>,
    next_handler_id: AtomicU64,
    dispatcher: Arc<dyn Dispatcher>,
    transport: RwLock<Option<Arc<dyn TransportAdapter<M>>>>,
    factories: DashMap<String, Arc<dyn ActorFactory<M>>>,
    watchers: DashMap<ActorId, Vec<Pid>>,
    target_cache: TargetCache,
    state: RwLock<SystemState>,
    store: RwLock<Option<Arc<dyn MessageStore<M>>>>,
}

impl<M: Message> ActorSystem<M> {
    /// Create a system from a configuration.
    ///
    /// Must run inside a tokio runtime: the dispatcher spawns its worker
    /// tasks here.
    pub fn new(config: SystemConfig) -> Self {
        let dispatcher: Arc<dyn Dispatcher> = match config.dispatcher {
            DispatcherKind::Basic => {
                Arc::new(BasicDispatcher::new(config.basic_dispatcher.clone()))
            }
            DispatcherKind::Layered => {
                Arc::new(LayeredDispatcher::new(config.layered_dispatcher.clone()))
            }
            DispatcherKind::Adaptive => {
                let mut layered = config.layered_dispatcher.clone();
                layered.adaptive = true;
                Arc::new(LayeredDispatcher::new(layered))
            }
        };

        let middleware = MiddlewareChain::new();
        middleware.set_enabled(config.enable_message_pipeline);

        Self {
            inner: Arc::new(SystemInner {
                dead_letters: DeadLetterSink::new(config.dead_letter_capacity),
                middleware,
                config,
                entries: DashMap::new(),
                names: DashMap::new(),
                pending: PendingRequests::new(),
                handlers: RwLock::new(Vec::new()),
                next_handler_id: AtomicU64::new(0),
                dispatcher,
                transport: RwLock::new(None),
                factories: DashMap::new(),
                watchers: DashMap::new(),
                target_cache: TargetCache::new(),
                state: RwLock::new(SystemState::Running),
                store: RwLock::new(None),
            }),
        }
    }

    /// The system configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    /// Number of registered actors.
    pub fn actor_count(&self) -> usize {
        self.inner.entries.len()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        *self.inner.state.read() != SystemState::Running
    }

    /// The dead-letter sink.
    pub fn dead_letters(&self) -> &DeadLetterSink<M> {
        &self.inner.dead_letters
    }

    /// Requests currently awaiting a response.
    pub fn pending_request_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Current size of an actor's mailbox, if it is registered.
    pub fn mailbox_size(&self, pid: &Pid) -> Option<usize> {
        self.inner.entries.get(pid.id()).map(|e| e.mailbox.size())
    }

    /// Resolve a registered name to its pid.
    pub fn lookup_name(&self, name: &str) -> Option<Pid> {
        self.inner.names.get(name).map(|p| p.value().clone())
    }

    /// Aggregate counters, when metrics are enabled.
    pub fn metrics_snapshot(&self) -> Option<SystemMetricsSnapshot> {
        if !self.inner.config.enable_metrics {
            return None;
        }
        let mut enqueued = 0u64;
        let mut dequeued = 0u64;
        let mut dropped = 0u64;
        for entry in self.inner.entries.iter() {
            let metrics = entry.mailbox.metrics();
            enqueued += metrics.enqueued_count();
            dequeued += metrics.dequeued_count();
            dropped += metrics.dropped_count();
        }
        Some(SystemMetricsSnapshot {
            actors: self.inner.entries.len(),
            messages_enqueued: enqueued,
            messages_dequeued: dequeued,
            messages_dropped: dropped,
            dead_letters: self.inner.dead_letters.total_count(),
            pending_requests: self.inner.pending.len(),
        })
    }

    // ------------------------------------------------------------------
    // Spawn
    // ------------------------------------------------------------------

    /// Spawn an actor from props, returning its pid.
    ///
    /// Runs `pre_start` inside the spawn; a failure there aborts the spawn
    /// with `StartFailure` and leaves nothing registered. Props carrying a
    /// remote address delegate to the transport adapter.
    pub async fn spawn<A>(&self, props: Props<A>) -> Result<Pid, SystemError>
    where
        A: Actor<Message = M>,
    {
        self.spawn_with_parent(props, None).await
    }

    pub(crate) async fn spawn_with_parent<A>(
        &self,
        props: Props<A>,
        parent: Option<Pid>,
    ) -> Result<Pid, SystemError>
    where
        A: Actor<Message = M>,
    {
        if self.is_shutting_down() {
            return Err(SystemError::ShuttingDown);
        }

        if let Some(address) = &props.remote_address {
            let transport = self
                .transport_handle()
                .ok_or_else(|| SystemError::NoTransport(address.clone()))?;
            let class_name = props.name.clone().unwrap_or_default();
            return transport.spawn_remote(&class_name, address).await;
        }

        let pid = Pid::local();
        let mailbox = Mailbox::new(
            props
                .backpressure
                .clone()
                .unwrap_or_else(|| self.inner.config.backpressure.clone()),
        );

        let actor = props.make();
        let ctx = ActorContext::new(pid.clone(), parent.clone(), self.clone());
        let lifecycle = ActorLifecycle::new();

        let class = props.dispatch_class.unwrap_or(TaskClass::Default);
        let budget = props
            .throughput
            .unwrap_or(self.inner.config.default_throughput)
            .max(1);

        let cell = ActorCell::new(
            pid.clone(),
            mailbox.clone(),
            CellState {
                actor,
                ctx,
                lifecycle,
            },
            Arc::clone(&props.factory),
            Arc::clone(&props.strategy),
            props.backoff.clone(),
            self.clone(),
            class,
            TaskPriority::Normal,
            budget,
        );
        let runner: Arc<dyn TurnRunner> = Arc::clone(&cell) as Arc<dyn TurnRunner>;

        let signal_runner = Arc::clone(&runner);
        mailbox.set_signal(Arc::new(move || {
            Arc::clone(&signal_runner).request_turn();
        }));

        // Register before pre_start so children spawned from the hook can
        // link to this actor; a failed start removes the registration.
        self.inner.entries.insert(
            *pid.id(),
            ActorEntry {
                pid: pid.clone(),
                name: props.name.clone(),
                mailbox: mailbox.clone(),
                runner,
                parent: parent.clone(),
                children: RwLock::new(Vec::new()),
                spawned_at: Utc::now(),
            },
        );
        if let Some(name) = &props.name {
            self.inner.names.insert(name.clone(), pid.clone());
        }
        if let Some(parent_pid) = &parent {
            if let Some(parent_entry) = self.inner.entries.get(parent_pid.id()) {
                parent_entry.children.write().push(pid.clone());
            }
        }

        if let Err(reason) = cell.start().await {
            // Remove the actor before surfacing the failure; children it
            // spawned from pre_start go down with it.
            for child in self.children_of(&pid) {
                if let Err(error) = self.stop(&child).await {
                    warn!(actor = %child, error = %error, "stopping child of failed spawn");
                }
            }
            for envelope in cell.abort_start() {
                self.dead_letter(envelope, DeadLetterReason::ActorStopped);
            }
            self.finalize_stop(&pid);
            return Err(SystemError::StartFailure(reason));
        }

        mailbox.post_system(SystemItem::Signal(SystemSignal::Start));
        debug!(actor = %pid, name = ?props.name, "actor spawned");
        Ok(pid)
    }

    /// Register a named factory for spawn-by-class-name.
    pub fn register_factory(&self, name: impl Into<String>, factory: Arc<dyn ActorFactory<M>>) {
        self.inner.factories.insert(name.into(), factory);
    }

    /// Spawn an actor through a registered factory.
    pub async fn spawn_by_name(&self, name: &str) -> Result<Pid, SystemError> {
        let factory = self
            .inner
            .factories
            .get(name)
            .map(|f| Arc::clone(f.value()))
            .ok_or_else(|| SystemError::UnknownClass(name.to_string()))?;
        factory.spawn(self).await
    }

    // ------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------

    /// Send an envelope to a pid.
    ///
    /// Undeliverable envelopes route to the dead-letter sink; the returned
    /// error is the observable signal (callers may ignore it). System-grade
    /// type tags (`"error"`, `"system*"`) select the system lane.
    pub async fn send(
        &self,
        target: &Pid,
        mut envelope: MessageEnvelope<M>,
    ) -> Result<(), SystemError> {
        if self.is_shutting_down() {
            return Err(SystemError::ShuttingDown);
        }

        if envelope.receiver.is_none() {
            envelope.receiver = Some(target.clone());
        }

        // Responses first try to satisfy a pending request.
        if envelope.metadata.is_response {
            if let Some(correlation) = envelope.metadata.correlation_id {
                if self
                    .inner
                    .pending
                    .complete(&correlation, envelope.payload.clone())
                {
                    self.notify_handlers(&envelope);
                    return Ok(());
                }
                // Late response: deliver normally when the target is a real
                // actor, drop silently otherwise.
                let target_registered =
                    target.is_local() && self.inner.entries.contains_key(target.id());
                if !target_registered {
                    debug!(correlation = %correlation, "late response dropped");
                    return Ok(());
                }
            }
        }

        let envelope = match self.inner.middleware.apply_send(envelope, target) {
            ChainOutcome::Pass(envelope) => envelope,
            ChainOutcome::Dropped(envelope) => {
                self.dead_letter(envelope, DeadLetterReason::MiddlewareDrop);
                return Ok(());
            }
        };

        self.notify_handlers(&envelope);
        if self.inner.config.enable_message_logging {
            debug!(
                to = %target,
                message_type = envelope.message_type(),
                message_id = %envelope.message_id,
                "delivering message"
            );
        }

        let resolved = self.inner.target_cache.resolve_with(target, || {
            if target.is_local() {
                ResolvedTarget::Local
            } else {
                ResolvedTarget::Remote
            }
        });

        match resolved {
            ResolvedTarget::Remote => self.send_remote(target, envelope).await,
            ResolvedTarget::Local => self.send_local(target, envelope).await,
        }
    }

    async fn send_local(
        &self,
        target: &Pid,
        envelope: MessageEnvelope<M>,
    ) -> Result<(), SystemError> {
        let mailbox = match self.inner.entries.get(target.id()) {
            Some(entry) => entry.mailbox.clone(),
            None => {
                self.inner.target_cache.invalidate(target);
                self.dead_letter(envelope, DeadLetterReason::UnknownTarget);
                return Err(SystemError::ActorNotFound(target.clone()));
            }
        };

        if mailbox.is_closed() {
            self.dead_letter(envelope, DeadLetterReason::ActorStopped);
            return Err(SystemError::ActorStopped(target.clone()));
        }

        if is_system_message_type(envelope.message_type()) {
            mailbox.post_system(SystemItem::Message(envelope));
            return Ok(());
        }

        // Record before offering: once the envelope is in the mailbox, the
        // turn may advance it to Delivered at any moment, and the state
        // chain only moves forward. A rejected offer degrades to Failed.
        let message_id = envelope.message_id;
        self.record_sent(&envelope).await;

        match mailbox.post_user(envelope).await {
            Ok(SubmitOutcome::Accepted) => Ok(()),
            Ok(SubmitOutcome::AcceptedDroppedOldest(evicted)) => {
                self.record_failed(&evicted.message_id).await;
                self.dead_letter(*evicted, DeadLetterReason::BackpressureDrop);
                Ok(())
            }
            Ok(SubmitOutcome::Rejected { kind, envelope }) => {
                self.record_failed(&message_id).await;
                self.dead_letter(*envelope, DeadLetterReason::BackpressureDrop);
                Err(SystemError::MessageDropped { kind })
            }
            Err(MailboxError::Backpressure(BackpressureError::QueueFull { size, max })) => {
                self.record_failed(&message_id).await;
                Err(SystemError::QueueFull { size, max })
            }
            Err(MailboxError::Closed)
            | Err(MailboxError::Backpressure(BackpressureError::Closed)) => {
                self.record_failed(&message_id).await;
                Err(SystemError::ActorStopped(target.clone()))
            }
        }
    }

    async fn send_remote(
        &self,
        target: &Pid,
        mut envelope: MessageEnvelope<M>,
    ) -> Result<(), SystemError> {
        let Some(transport) = self.transport_handle() else {
            let address = target.address().unwrap_or_default().to_string();
            self.dead_letter(envelope, DeadLetterReason::UnknownTarget);
            return Err(SystemError::NoTransport(address));
        };

        // Rewrite local sender pids with this system's address so replies
        // route back across the transport.
        if let (Some(address), Some(sender)) =
            (&self.inner.config.system_address, &envelope.sender)
        {
            if sender.is_local() {
                envelope.sender = Some(sender.with_address(address.clone()));
            }
        }

        transport.deliver(envelope).await
    }

    /// Send many envelopes, pairing `targets[i]` with `envelopes[i]`.
    ///
    /// Small batches take the direct path; larger ones group by target and
    /// run groups concurrently (bounded), keeping per-target order intact.
    /// Individual failures route to dead letters without aborting the rest.
    pub async fn send_batch(
        &self,
        targets: &[Pid],
        envelopes: Vec<MessageEnvelope<M>>,
    ) -> Result<(), SystemError> {
        if self.is_shutting_down() {
            return Err(SystemError::ShuttingDown);
        }

        let total = targets.len().min(envelopes.len());
        if total < DIRECT_SEND_THRESHOLD {
            for (target, envelope) in targets.iter().zip(envelopes) {
                if let Err(error) = self.send(target, envelope).await {
                    debug!(to = %target, error = %error, "batch direct send failed");
                }
            }
            return Ok(());
        }

        let groups = group_by_target(targets, envelopes);
        futures::stream::iter(groups)
            .for_each_concurrent(DEFAULT_MAX_CONCURRENT_BATCHES, |(target, batch)| {
                let system = self.clone();
                async move {
                    for envelope in batch {
                        if let Err(error) = system.send(&target, envelope).await {
                            debug!(to = %target, error = %error, "batch send failed");
                        }
                    }
                }
            })
            .await;
        Ok(())
    }

    /// Invoke every registered message handler with the envelope.
    pub fn broadcast(&self, envelope: MessageEnvelope<M>) {
        self.notify_handlers(&envelope);
    }

    // ------------------------------------------------------------------
    // Request / response
    // ------------------------------------------------------------------

    /// Issue a request and await the correlated response payload.
    ///
    /// A fresh correlation id is assigned; the envelope goes out flagged as
    /// a request with a synthetic reply-to pid. The returned future resolves
    /// with the first matching response or rejects with `RequestTimeout`;
    /// either way the correlation id sees exactly one outcome.
    pub async fn request(
        &self,
        target: &Pid,
        envelope: MessageEnvelope<M>,
        timeout_duration: Duration,
    ) -> Result<M, SystemError> {
        self.request_from(None, target, envelope, timeout_duration)
            .await
    }

    pub(crate) async fn request_from(
        &self,
        origin: Option<Pid>,
        target: &Pid,
        mut envelope: MessageEnvelope<M>,
        timeout_duration: Duration,
    ) -> Result<M, SystemError> {
        let correlation = Uuid::new_v4();
        let reply_to = Pid::local();
        envelope.metadata.correlation_id = Some(correlation);
        envelope.metadata.is_request = true;
        envelope.metadata.reply_to = Some(reply_to);

        let rx = self.inner.pending.register(correlation, origin);

        if let Err(error) = self.send(target, envelope).await {
            self.inner.pending.remove(&correlation);
            return Err(error);
        }

        match timeout(timeout_duration, rx).await {
            Ok(Ok(RequestOutcome::Reply(payload))) => Ok(payload),
            Ok(Ok(RequestOutcome::Cancelled)) => Err(SystemError::RequestCancelled),
            Ok(Err(_closed)) => Err(SystemError::RequestCancelled),
            Err(_elapsed) => {
                self.inner.pending.remove(&correlation);
                Err(SystemError::RequestTimeout(timeout_duration))
            }
        }
    }

    // ------------------------------------------------------------------
    // Stop / shutdown
    // ------------------------------------------------------------------

    /// Stop an actor: children first (post-order), then drain system
    /// messages, dead-letter queued user messages, run `post_stop`, and
    /// deregister. Idempotent; do not call from inside the actor's own
    /// handler (use `ActorContext::stop_self`).
    pub async fn stop(&self, pid: &Pid) -> Result<(), SystemError> {
        self.stop_inner(pid.clone()).await
    }

    fn stop_inner(&self, pid: Pid) -> BoxFuture<'_, Result<(), SystemError>> {
        Box::pin(async move {
            for child in self.children_of(&pid) {
                self.stop_inner(child).await?;
            }
            let runner = match self.inner.entries.get(pid.id()) {
                Some(entry) => Arc::clone(&entry.runner),
                None => return Ok(()), // already stopped
            };
            runner.run_stop().await;
            Ok(())
        })
    }

    /// Stop an actor from a detached task (safe inside handlers).
    pub(crate) fn stop_detached(&self, pid: Pid) {
        let system = self.clone();
        tokio::spawn(async move {
            if let Err(error) = system.stop(&pid).await {
                warn!(actor = %pid, error = %error, "detached stop failed");
            }
        });
    }

    /// Gracefully shut the system down.
    ///
    /// Stops all actors (children before parents), then joins the
    /// dispatcher. Returns only after every actor has completed `post_stop`,
    /// or fails with `ShutdownTimeout`.
    pub async fn shutdown(&self) -> Result<(), SystemError> {
        {
            let mut state = self.inner.state.write();
            if *state != SystemState::Running {
                return Err(SystemError::ShuttingDown);
            }
            *state = SystemState::ShuttingDown;
        }

        let timeout_duration = self.inner.config.shutdown_timeout;
        match timeout(timeout_duration, self.stop_all()).await {
            Ok(()) => {
                self.inner.dispatcher.shutdown().await;
                *self.inner.state.write() = SystemState::Stopped;
                Ok(())
            }
            Err(_elapsed) => Err(SystemError::ShutdownTimeout(timeout_duration)),
        }
    }

    async fn stop_all(&self) {
        while !self.inner.entries.is_empty() {
            let mut targets: Vec<Pid> = self
                .inner
                .entries
                .iter()
                .filter(|e| e.parent.is_none())
                .map(|e| e.pid.clone())
                .collect();
            if targets.is_empty() {
                targets = self.inner.entries.iter().map(|e| e.pid.clone()).collect();
            }
            for pid in targets {
                if let Err(error) = self.stop(&pid).await {
                    warn!(actor = %pid, error = %error, "stop during shutdown failed");
                }
            }
        }
    }

    /// Immediate shutdown: close every mailbox, dead-letter queued
    /// messages, and join the dispatcher without running `post_stop`.
    pub async fn force_shutdown(&self) {
        *self.inner.state.write() = SystemState::Stopped;

        let pids: Vec<Pid> = self.inner.entries.iter().map(|e| e.pid.clone()).collect();
        for pid in pids {
            if let Some((_, entry)) = self.inner.entries.remove(pid.id()) {
                let (_system_rest, user_rest) = entry.mailbox.close();
                for envelope in user_rest {
                    self.dead_letter(envelope, DeadLetterReason::ActorStopped);
                }
            }
        }
        self.inner.names.clear();
        self.inner.watchers.clear();
        self.inner.dispatcher.shutdown().await;
    }

    // ------------------------------------------------------------------
    // Observation, middleware, collaborators
    // ------------------------------------------------------------------

    /// Subscribe to all deliveries and broadcasts.
    pub fn add_message_handler(&self, handler: Arc<dyn MessageHandler<M>>) -> HandlerId {
        let id = HandlerId(self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed));
        self.inner.handlers.write().push((id, handler));
        id
    }

    /// Remove a previously registered handler.
    pub fn remove_message_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.inner.handlers.write();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    /// Append a middleware interceptor to the pipeline.
    pub fn add_message_middleware(&self, middleware: Arc<dyn Middleware<M>>) {
        self.inner.middleware.add(middleware);
    }

    /// Enable the middleware pipeline.
    pub fn enable_message_pipeline(&self) {
        self.inner.middleware.set_enabled(true);
    }

    /// Disable the middleware pipeline.
    pub fn disable_message_pipeline(&self) {
        self.inner.middleware.set_enabled(false);
    }

    /// Whether the pipeline currently applies.
    pub fn is_message_pipeline_enabled(&self) -> bool {
        self.inner.middleware.is_enabled()
    }

    /// Attach the transport adapter for remote pids.
    pub fn set_transport(&self, transport: Arc<dyn TransportAdapter<M>>) {
        *self.inner.transport.write() = Some(transport);
    }

    /// Attach a message store for delivery-state bookkeeping.
    pub fn set_store(&self, store: Arc<dyn MessageStore<M>>) {
        *self.inner.store.write() = Some(store);
    }

    // ------------------------------------------------------------------
    // Crate-internal plumbing
    // ------------------------------------------------------------------

    pub(crate) fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.inner.dispatcher
    }

    pub(crate) fn middleware_chain(&self) -> &MiddlewareChain<M> {
        &self.inner.middleware
    }

    pub(crate) fn children_of(&self, pid: &Pid) -> Vec<Pid> {
        self.inner
            .entries
            .get(pid.id())
            .map(|entry| entry.children.read().clone())
            .unwrap_or_default()
    }

    pub(crate) fn watch(&self, watcher: Pid, target: &Pid) {
        self.inner
            .watchers
            .entry(*target.id())
            .or_default()
            .push(watcher);
    }

    /// Post a control signal to a registered actor's system lane.
    pub(crate) fn post_signal(&self, pid: &Pid, signal: SystemSignal) -> bool {
        let mailbox = match self.inner.entries.get(pid.id()) {
            Some(entry) => entry.mailbox.clone(),
            None => return false,
        };
        mailbox.post_system(SystemItem::Signal(signal));
        true
    }

    /// Route an undeliverable envelope to the sink and notify observers.
    pub(crate) fn dead_letter(&self, envelope: MessageEnvelope<M>, reason: DeadLetterReason) {
        warn!(
            message_id = %envelope.message_id,
            message_type = envelope.message_type(),
            reason = %reason,
            "dead letter"
        );
        self.inner.middleware.notify_dead_letter(&envelope, &reason);
        self.inner.dead_letters.record(envelope, reason);
    }

    /// Remove every trace of a stopped actor.
    pub(crate) fn finalize_stop(&self, pid: &Pid) {
        let Some((_, entry)) = self.inner.entries.remove(pid.id()) else {
            return;
        };

        if let Some(name) = &entry.name {
            self.inner
                .names
                .remove_if(name, |_, registered| registered.id() == pid.id());
        }
        self.inner.target_cache.invalidate(pid);
        self.inner.pending.cancel_for_origin(pid);

        if let Some(parent) = &entry.parent {
            if let Some(parent_entry) = self.inner.entries.get(parent.id()) {
                parent_entry
                    .children
                    .write()
                    .retain(|child| child.id() != pid.id());
            }
        }

        if let Some((_, watchers)) = self.inner.watchers.remove(pid.id()) {
            for watcher in watchers {
                self.post_signal(&watcher, SystemSignal::WatchTerminated(pid.clone()));
            }
        }
    }

    fn transport_handle(&self) -> Option<Arc<dyn TransportAdapter<M>>> {
        self.inner.transport.read().clone()
    }

    fn store_handle(&self) -> Option<Arc<dyn MessageStore<M>>> {
        self.inner.store.read().clone()
    }

    async fn record_sent(&self, envelope: &MessageEnvelope<M>) {
        if let Some(store) = self.store_handle() {
            if let Err(error) = store.save(envelope).await {
                warn!(error = %error, "store save failed");
                return;
            }
            if let Err(error) = store
                .set_status(&envelope.message_id, DeliveryState::Sent)
                .await
            {
                warn!(error = %error, "store status update failed");
            }
        }
    }

    async fn record_failed(&self, message_id: &crate::util::MessageId) {
        if let Some(store) = self.store_handle() {
            if let Err(error) = store.set_status(message_id, DeliveryState::Failed).await {
                debug!(error = %error, "store failed mark skipped");
            }
        }
    }

    pub(crate) async fn record_delivered(&self, envelope: &MessageEnvelope<M>) {
        if let Some(store) = self.store_handle() {
            if let Err(error) = store.mark_as_delivered(&envelope.message_id).await {
                debug!(error = %error, "store delivered mark skipped");
            }
        }
    }

    fn notify_handlers(&self, envelope: &MessageEnvelope<M>) {
        let handlers: Vec<Arc<dyn MessageHandler<M>>> = self
            .inner
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler.on_message(envelope);
        }
    }
}
