//! Actor cell: owns one actor instance and runs its processing turns.
//!
//! A turn drains the system lane, then processes up to the budget of user
//! messages, invoking the actor's `receive` per message. The cell's async
//! mutex serializes turns with the stop path; the mailbox turn token backs
//! the one-turn-per-mailbox invariant. Handler failures become supervision
//! events here and never leave the cell.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::actor_system::ActorSystem;
use super::dead_letter::DeadLetterReason;
use crate::actor::{Actor, ActorContext, ActorLifecycle, ActorState};
use crate::dispatch::{DispatchTask, TaskClass, TaskPriority};
use crate::mailbox::{Mailbox, MetricsRecorder};
use crate::message::{MessageEnvelope, SystemItem, SystemSignal};
use crate::pipeline::ChainOutcome;
use crate::supervisor::{Directive, Failure, RestartBackoff, SupervisorStrategy};
use crate::util::Pid;

/// The mutable half of a cell: actor instance, context, lifecycle.
pub(crate) struct CellState<A: Actor> {
    pub(crate) actor: A,
    pub(crate) ctx: ActorContext<A::Message>,
    pub(crate) lifecycle: ActorLifecycle,
}

/// Type-erased handle the registry keeps per actor.
#[async_trait]
pub(crate) trait TurnRunner: Send + Sync {
    /// Schedule one processing turn on the dispatcher.
    fn request_turn(self: Arc<Self>);

    /// Run the stop sequence: drain system messages, dead-letter user
    /// messages, run `post_stop`, deregister. Idempotent.
    async fn run_stop(self: Arc<Self>);
}

/// How a turn step ended.
enum Flow {
    /// Keep processing this turn
    Handled,

    /// End the turn; queued messages stay for the next turn
    AbandonTurn,

    /// A stop was initiated; end the turn without re-scheduling
    Stopping,
}

pub(crate) struct ActorCell<A: Actor> {
    pid: Pid,
    mailbox: Mailbox<A::Message>,
    state: Mutex<CellState<A>>,
    factory: Arc<dyn Fn() -> A + Send + Sync>,
    strategy: Arc<dyn SupervisorStrategy>,
    backoff: SyncMutex<RestartBackoff>,
    system: ActorSystem<A::Message>,
    class: TaskClass,
    priority: TaskPriority,
    budget: usize,
    stopped: AtomicBool,
}

impl<A: Actor> ActorCell<A> {
    #[allow(clippy::too_many_arguments)] // spawn is the single construction site
    pub(crate) fn new(
        pid: Pid,
        mailbox: Mailbox<A::Message>,
        state: CellState<A>,
        factory: Arc<dyn Fn() -> A + Send + Sync>,
        strategy: Arc<dyn SupervisorStrategy>,
        backoff: RestartBackoff,
        system: ActorSystem<A::Message>,
        class: TaskClass,
        priority: TaskPriority,
        budget: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            pid,
            mailbox,
            state: Mutex::new(state),
            factory,
            strategy,
            backoff: SyncMutex::new(backoff),
            system,
            class,
            priority,
            budget,
            stopped: AtomicBool::new(false),
        })
    }

    /// Run `pre_start` under the cell lock. Called once by spawn, after
    /// registration; turns scheduled in the meantime queue behind the lock
    /// and skip user messages until the lifecycle reaches Running.
    pub(crate) async fn start(&self) -> Result<(), String> {
        let mut state = self.state.lock().await;
        let CellState {
            actor,
            ctx,
            lifecycle,
        } = &mut *state;
        actor
            .pre_start(ctx)
            .await
            .map_err(|error| error.to_string())?;
        lifecycle.transition_to(ActorState::Started);
        Ok(())
    }

    /// Tear down a cell whose `pre_start` failed: poison it and hand back
    /// whatever raced into the mailbox.
    pub(crate) fn abort_start(&self) -> Vec<MessageEnvelope<A::Message>> {
        self.stopped.store(true, Ordering::Release);
        let (_system_rest, user_rest) = self.mailbox.close();
        user_rest
    }

    async fn run_turn(self: Arc<Self>) {
        // Arrivals from here on raise a fresh schedule request.
        self.mailbox.clear_scheduled();
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        if !self.mailbox.try_begin_turn() {
            return;
        }

        let mut state = self.state.lock().await;
        let flow = if self.stopped.load(Ordering::Acquire) {
            Flow::Stopping
        } else {
            self.process_turn(&mut state).await
        };
        drop(state);
        self.mailbox.end_turn();

        if !matches!(flow, Flow::Stopping)
            && !self.mailbox.is_empty()
            && !self.stopped.load(Ordering::Acquire)
        {
            self.mailbox.request_schedule();
        }
    }

    async fn process_turn(&self, state: &mut CellState<A>) -> Flow {
        // System lane drains completely before any user message.
        while let Some(item) = self.mailbox.next_system() {
            let flow = match item {
                SystemItem::Signal(signal) => self.handle_signal(state, signal).await,
                SystemItem::Message(envelope) => self.deliver(state, envelope).await,
            };
            match flow {
                Flow::Handled => {}
                other => return other,
            }
        }

        match state.lifecycle.state() {
            ActorState::Running => {}
            // A detached stop owns the rest of this actor's life.
            ActorState::Stopping | ActorState::Stopped => return Flow::Stopping,
            // Not started yet; the Start signal is on its way.
            _ => return Flow::Handled,
        }

        for _ in 0..self.budget {
            let Some(envelope) = self.mailbox.next_user() else {
                break;
            };
            let message_id = envelope.message_id;

            if envelope.is_expired() {
                self.mailbox.metrics().record_dropped();
                self.system.dead_letter(envelope, DeadLetterReason::Expired);
                self.mailbox.complete(&message_id);
                continue;
            }

            let flow = self.deliver(state, envelope).await;
            self.mailbox.complete(&message_id);
            match flow {
                Flow::Handled => {}
                other => return other,
            }
        }

        Flow::Handled
    }

    async fn deliver(
        &self,
        state: &mut CellState<A>,
        envelope: MessageEnvelope<A::Message>,
    ) -> Flow {
        let envelope = match self
            .system
            .middleware_chain()
            .apply_receive(envelope, &self.pid)
        {
            ChainOutcome::Pass(envelope) => envelope,
            ChainOutcome::Dropped(envelope) => {
                self.system
                    .dead_letter(envelope, DeadLetterReason::MiddlewareDrop);
                return Flow::Handled;
            }
        };

        self.system.record_delivered(&envelope).await;

        let preserved = envelope.clone();
        match state.actor.receive(envelope, &mut state.ctx).await {
            Ok(()) => Flow::Handled,
            Err(error) => {
                self.handle_failure(state, error.to_string(), Some(&preserved))
                    .await
            }
        }
    }

    async fn handle_failure(
        &self,
        state: &mut CellState<A>,
        reason: String,
        envelope: Option<&MessageEnvelope<A::Message>>,
    ) -> Flow {
        let failure = Failure {
            actor: self.pid.clone(),
            reason,
            restart_count: state.lifecycle.restart_count(),
        };
        warn!(actor = %self.pid, error = %failure.reason, "handler failed");
        self.system.middleware_chain().notify_error(&failure, envelope);

        let directive = self.strategy.decide(&failure);
        self.apply_directive(state, directive, failure).await
    }

    async fn apply_directive(
        &self,
        state: &mut CellState<A>,
        directive: Directive,
        failure: Failure,
    ) -> Flow {
        match directive {
            Directive::Resume => Flow::Handled,
            Directive::Restart => {
                if self.perform_restart(state, &failure).await {
                    Flow::AbandonTurn
                } else {
                    self.fail_restart(state, failure)
                }
            }
            Directive::Stop => {
                self.begin_stop(state);
                Flow::Stopping
            }
            Directive::Escalate => match state.ctx.parent().cloned() {
                Some(parent) => {
                    self.system.post_signal(
                        &parent,
                        SystemSignal::ChildFailed {
                            child: self.pid.clone(),
                            reason: failure.reason,
                            restart_count: failure.restart_count,
                        },
                    );
                    Flow::AbandonTurn
                }
                // The root supervisor defaults to Restart.
                None => {
                    if self.perform_restart(state, &failure).await {
                        Flow::AbandonTurn
                    } else {
                        self.fail_restart(state, failure)
                    }
                }
            },
        }
    }

    /// Restart in place: rate-limit, run `pre_restart` on the failing
    /// instance, rebuild from the factory, run `post_restart` on the fresh
    /// one. Returns false when the restart budget is exhausted or the fresh
    /// instance refuses to start.
    async fn perform_restart(&self, state: &mut CellState<A>, failure: &Failure) -> bool {
        let delay = {
            let mut backoff = self.backoff.lock();
            if backoff.is_limit_exceeded() {
                None
            } else {
                backoff.record_restart();
                Some(backoff.calculate_delay())
            }
        };
        let Some(delay) = delay else {
            return false;
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        state.lifecycle.transition_to(ActorState::Restarting);
        if let Err(error) = state.actor.pre_restart(failure, &mut state.ctx).await {
            warn!(actor = %self.pid, error = %error, "pre_restart hook failed");
        }

        let mut fresh = (self.factory)();
        if let Err(error) = fresh.post_restart(failure, &mut state.ctx).await {
            warn!(actor = %self.pid, error = %error, "post_restart hook failed");
            return false;
        }

        state.actor = fresh;
        state.lifecycle.transition_to(ActorState::Running);
        debug!(actor = %self.pid, restarts = state.lifecycle.restart_count(), "actor restarted");
        true
    }

    /// Restart not possible: stop and escalate a restart failure upward.
    fn fail_restart(&self, state: &mut CellState<A>, failure: Failure) -> Flow {
        warn!(actor = %self.pid, "restart not possible, stopping");
        if let Some(parent) = state.ctx.parent().cloned() {
            self.system.post_signal(
                &parent,
                SystemSignal::ChildFailed {
                    child: self.pid.clone(),
                    reason: format!("restart failed: {}", failure.reason),
                    restart_count: failure.restart_count,
                },
            );
        }
        self.begin_stop(state);
        Flow::Stopping
    }

    /// Mark the actor stopping and hand the stop sequence to a detached
    /// task; it acquires the cell after this turn releases it.
    fn begin_stop(&self, state: &mut CellState<A>) {
        state.lifecycle.transition_to(ActorState::Stopping);
        self.system.stop_detached(self.pid.clone());
    }

    async fn handle_signal(&self, state: &mut CellState<A>, signal: SystemSignal) -> Flow {
        match signal {
            SystemSignal::Start => {
                state.lifecycle.transition_to(ActorState::Running);
                Flow::Handled
            }
            SystemSignal::Stop => {
                self.begin_stop(state);
                Flow::Stopping
            }
            SystemSignal::Restart { reason } => {
                let failure = Failure {
                    actor: self.pid.clone(),
                    reason,
                    restart_count: state.lifecycle.restart_count(),
                };
                if self.perform_restart(state, &failure).await {
                    Flow::AbandonTurn
                } else {
                    self.fail_restart(state, failure)
                }
            }
            SystemSignal::ChildFailed {
                child,
                reason,
                restart_count,
            } => {
                self.supervise_child(state, child, reason, restart_count);
                Flow::Handled
            }
            SystemSignal::WatchTerminated(pid) => {
                state.actor.on_terminated(&pid, &mut state.ctx).await;
                Flow::Handled
            }
        }
    }

    /// The parent's strategy decides the directive for a failed child.
    fn supervise_child(
        &self,
        state: &mut CellState<A>,
        child: Pid,
        reason: String,
        restart_count: u32,
    ) {
        let failure = Failure {
            actor: child.clone(),
            reason,
            restart_count,
        };
        let directive = self.strategy.decide(&failure);
        debug!(supervisor = %self.pid, child = %child, directive = %directive, "supervising child failure");

        match directive {
            Directive::Resume => {}
            Directive::Restart => {
                self.system.post_signal(
                    &child,
                    SystemSignal::Restart {
                        reason: failure.reason,
                    },
                );
            }
            Directive::Stop => self.system.stop_detached(child),
            Directive::Escalate => match state.ctx.parent().cloned() {
                Some(grandparent) => {
                    self.system.post_signal(
                        &grandparent,
                        SystemSignal::ChildFailed {
                            child,
                            reason: failure.reason,
                            restart_count,
                        },
                    );
                }
                // Escalation above the root falls back to Restart.
                None => {
                    self.system.post_signal(
                        &child,
                        SystemSignal::Restart {
                            reason: failure.reason,
                        },
                    );
                }
            },
        }
    }
}

#[async_trait]
impl<A: Actor> TurnRunner for ActorCell<A> {
    fn request_turn(self: Arc<Self>) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let cell = Arc::clone(&self);
        let task = DispatchTask {
            class: self.class,
            priority: self.priority,
            future: Box::pin(async move {
                cell.run_turn().await;
            }),
        };
        if let Err(error) = self.system.dispatcher().schedule(task) {
            debug!(actor = %self.pid, error = %error, "dispatcher rejected turn");
        }
    }

    async fn run_stop(self: Arc<Self>) {
        let mut state = self.state.lock().await;
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        state.lifecycle.transition_to(ActorState::Stopping);

        // Drain the system lane before post_stop; system-grade user
        // messages are still delivered, watch notices still fire.
        while let Some(item) = self.mailbox.next_system() {
            match item {
                SystemItem::Signal(SystemSignal::WatchTerminated(pid)) => {
                    let state = &mut *state;
                    state.actor.on_terminated(&pid, &mut state.ctx).await;
                }
                SystemItem::Message(envelope) => {
                    let state = &mut *state;
                    if let Err(error) = state.actor.receive(envelope, &mut state.ctx).await {
                        warn!(actor = %self.pid, error = %error, "handler failed during stop drain");
                    }
                }
                SystemItem::Signal(_) => {}
            }
        }

        // Close the mailbox; everything still queued becomes a dead letter.
        let (system_rest, user_rest) = self.mailbox.close();
        for item in system_rest {
            if let SystemItem::Message(envelope) = item {
                self.system
                    .dead_letter(envelope, DeadLetterReason::ActorStopped);
            }
        }
        for envelope in user_rest {
            self.system
                .dead_letter(envelope, DeadLetterReason::ActorStopped);
        }

        if let Err(error) = {
            let state = &mut *state;
            state.actor.post_stop(&mut state.ctx).await
        } {
            warn!(actor = %self.pid, error = %error, "post_stop hook failed");
        }
        state.lifecycle.transition_to(ActorState::Stopped);
        drop(state);

        self.system.finalize_stop(&self.pid);
        debug!(actor = %self.pid, "actor stopped");
    }
}
