//! Middleware chain.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::RwLock;

// Layer 3: Internal module imports
use crate::message::{Message, MessageEnvelope};
use crate::supervisor::Failure;
use crate::system::DeadLetterReason;
use crate::util::Pid;

/// Result of one interceptor hook.
pub enum MiddlewareDecision<M: Message> {
    /// Pass the (possibly modified) envelope to the next interceptor.
    Continue(MessageEnvelope<M>),

    /// Discard the message; no further hook runs.
    Drop(MessageEnvelope<M>),
}

/// One interceptor in the pipeline. All hooks are optional.
///
/// `on_send` and `on_receive` may modify the envelope or signal a drop;
/// `on_dead_letter` and `on_error` observe only.
///
/// # Example
/// ```rust
/// use herald_rt::message::{Message, MessageEnvelope};
/// use herald_rt::pipeline::{Middleware, MiddlewareDecision};
/// use herald_rt::util::Pid;
///
/// #[derive(Debug, Clone)]
/// struct Note(String);
/// impl Message for Note {
///     fn message_type(&self) -> &str {
///         "note"
///     }
/// }
///
/// struct DropEmpty;
///
/// impl Middleware<Note> for DropEmpty {
///     fn on_send(
///         &self,
///         envelope: MessageEnvelope<Note>,
///         _target: &Pid,
///     ) -> MiddlewareDecision<Note> {
///         if envelope.payload.0.is_empty() {
///             MiddlewareDecision::Drop(envelope)
///         } else {
///             MiddlewareDecision::Continue(envelope)
///         }
///     }
/// }
/// ```
pub trait Middleware<M: Message>: Send + Sync {
    /// Intercept an outgoing envelope before admission.
    fn on_send(&self, envelope: MessageEnvelope<M>, _target: &Pid) -> MiddlewareDecision<M> {
        MiddlewareDecision::Continue(envelope)
    }

    /// Intercept an envelope as the target's turn dequeues it.
    fn on_receive(&self, envelope: MessageEnvelope<M>, _target: &Pid) -> MiddlewareDecision<M> {
        MiddlewareDecision::Continue(envelope)
    }

    /// Observe an envelope arriving at the dead-letter sink.
    fn on_dead_letter(&self, _envelope: &MessageEnvelope<M>, _reason: &DeadLetterReason) {}

    /// Observe a handler failure.
    fn on_error(&self, _failure: &Failure, _envelope: Option<&MessageEnvelope<M>>) {}
}

/// Outcome of running an envelope through the whole chain.
pub enum ChainOutcome<M: Message> {
    /// Every interceptor passed; deliver this envelope.
    Pass(MessageEnvelope<M>),

    /// An interceptor dropped the message; later hooks did not run.
    Dropped(MessageEnvelope<M>),
}

/// Ordered chain of interceptors with an enable switch.
///
/// With the pipeline disabled (or with only identity interceptors) the
/// chain is observationally equivalent to no chain at all.
pub struct MiddlewareChain<M: Message> {
    interceptors: RwLock<Vec<Arc<dyn Middleware<M>>>>,
    enabled: AtomicBool,
}

impl<M: Message> Default for MiddlewareChain<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> MiddlewareChain<M> {
    /// Create an empty, enabled chain.
    pub fn new() -> Self {
        Self {
            interceptors: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Append an interceptor to the chain.
    pub fn add(&self, middleware: Arc<dyn Middleware<M>>) {
        self.interceptors.write().push(middleware);
    }

    /// Number of registered interceptors.
    pub fn len(&self) -> usize {
        self.interceptors.read().len()
    }

    /// Whether the chain has no interceptors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Toggle the pipeline.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Whether the pipeline currently applies.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Run the send hooks in order.
    pub fn apply_send(&self, envelope: MessageEnvelope<M>, target: &Pid) -> ChainOutcome<M> {
        self.apply(envelope, target, |middleware, envelope, target| {
            middleware.on_send(envelope, target)
        })
    }

    /// Run the receive hooks in order.
    pub fn apply_receive(&self, envelope: MessageEnvelope<M>, target: &Pid) -> ChainOutcome<M> {
        self.apply(envelope, target, |middleware, envelope, target| {
            middleware.on_receive(envelope, target)
        })
    }

    /// Notify the dead-letter hooks.
    pub fn notify_dead_letter(&self, envelope: &MessageEnvelope<M>, reason: &DeadLetterReason) {
        if !self.is_enabled() {
            return;
        }
        for middleware in self.interceptors.read().iter() {
            middleware.on_dead_letter(envelope, reason);
        }
    }

    /// Notify the error hooks.
    pub fn notify_error(&self, failure: &Failure, envelope: Option<&MessageEnvelope<M>>) {
        if !self.is_enabled() {
            return;
        }
        for middleware in self.interceptors.read().iter() {
            middleware.on_error(failure, envelope);
        }
    }

    fn apply(
        &self,
        mut envelope: MessageEnvelope<M>,
        target: &Pid,
        hook: impl Fn(&dyn Middleware<M>, MessageEnvelope<M>, &Pid) -> MiddlewareDecision<M>,
    ) -> ChainOutcome<M> {
        if !self.is_enabled() {
            return ChainOutcome::Pass(envelope);
        }

        let interceptors = self.interceptors.read().clone();
        for middleware in interceptors.iter() {
            match hook(middleware.as_ref(), envelope, target) {
                MiddlewareDecision::Continue(next) => envelope = next,
                MiddlewareDecision::Drop(dropped) => return ChainOutcome::Dropped(dropped),
            }
        }
        ChainOutcome::Pass(envelope)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq)]
    struct Note(String);

    impl Message for Note {
        fn message_type(&self) -> &str {
            "note"
        }
    }

    struct Identity;
    impl Middleware<Note> for Identity {}

    struct Tagger;
    impl Middleware<Note> for Tagger {
        fn on_send(
            &self,
            mut envelope: MessageEnvelope<Note>,
            _target: &Pid,
        ) -> MiddlewareDecision<Note> {
            envelope.payload.0.push_str("+tag");
            MiddlewareDecision::Continue(envelope)
        }
    }

    struct DropAll {
        seen: AtomicUsize,
    }
    impl Middleware<Note> for DropAll {
        fn on_send(
            &self,
            envelope: MessageEnvelope<Note>,
            _target: &Pid,
        ) -> MiddlewareDecision<Note> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            MiddlewareDecision::Drop(envelope)
        }
    }

    fn pass(outcome: ChainOutcome<Note>) -> MessageEnvelope<Note> {
        match outcome {
            ChainOutcome::Pass(envelope) => envelope,
            ChainOutcome::Dropped(_) => panic!("expected pass"),
        }
    }

    #[test]
    fn test_identity_chain_is_transparent() {
        let chain = MiddlewareChain::new();
        chain.add(Arc::new(Identity));

        let target = Pid::local();
        let envelope = MessageEnvelope::new(Note("hello".to_string()));
        let id = envelope.message_id;

        let out = pass(chain.apply_send(envelope, &target));
        assert_eq!(out.message_id, id);
        assert_eq!(out.payload, Note("hello".to_string()));
    }

    #[test]
    fn test_interceptors_run_in_order() {
        let chain = MiddlewareChain::new();
        chain.add(Arc::new(Tagger));
        chain.add(Arc::new(Tagger));

        let target = Pid::local();
        let out = pass(chain.apply_send(MessageEnvelope::new(Note("x".to_string())), &target));
        assert_eq!(out.payload, Note("x+tag+tag".to_string()));
    }

    #[test]
    fn test_drop_short_circuits() {
        let chain = MiddlewareChain::new();
        let dropper = Arc::new(DropAll {
            seen: AtomicUsize::new(0),
        });
        let tail = Arc::new(DropAll {
            seen: AtomicUsize::new(0),
        });
        chain.add(Arc::clone(&dropper) as Arc<dyn Middleware<Note>>);
        chain.add(Arc::clone(&tail) as Arc<dyn Middleware<Note>>);

        let target = Pid::local();
        let outcome = chain.apply_send(MessageEnvelope::new(Note("x".to_string())), &target);
        assert!(matches!(outcome, ChainOutcome::Dropped(_)));
        assert_eq!(dropper.seen.load(Ordering::SeqCst), 1);
        // No further hook ran after the drop.
        assert_eq!(tail.seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disabled_chain_passes_through() {
        let chain = MiddlewareChain::new();
        chain.add(Arc::new(DropAll {
            seen: AtomicUsize::new(0),
        }));
        chain.set_enabled(false);

        let target = Pid::local();
        let outcome = chain.apply_send(MessageEnvelope::new(Note("x".to_string())), &target);
        assert!(matches!(outcome, ChainOutcome::Pass(_)));
    }
}
