//! Spawn properties.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::traits::Actor;
use crate::dispatch::TaskClass;
use crate::mailbox::BackpressureConfig;
use crate::supervisor::{AlwaysRestart, RestartBackoff, SupervisorStrategy};

/// Everything needed to spawn (and restart) one actor.
///
/// Carries the actor factory plus per-actor overrides for the mailbox,
/// dispatcher class, and supervision. The factory is kept for the actor's
/// whole life: a supervisor-directed restart rebuilds the instance from it,
/// resetting state.
///
/// # Example
/// ```rust,ignore
/// let props = Props::new(|| CounterActor { count: 0 })
///     .with_name("counter")
///     .with_strategy(AlwaysRestart);
/// let pid = system.spawn(props).await?;
/// ```
pub struct Props<A: Actor> {
    pub(crate) factory: Arc<dyn Fn() -> A + Send + Sync>,
    pub(crate) name: Option<String>,
    pub(crate) backpressure: Option<BackpressureConfig>,
    pub(crate) dispatch_class: Option<TaskClass>,
    pub(crate) strategy: Arc<dyn SupervisorStrategy>,
    pub(crate) backoff: RestartBackoff,
    pub(crate) throughput: Option<usize>,
    pub(crate) remote_address: Option<String>,
}

impl<A: Actor> Clone for Props<A> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            name: self.name.clone(),
            backpressure: self.backpressure.clone(),
            dispatch_class: self.dispatch_class,
            strategy: Arc::clone(&self.strategy),
            backoff: self.backoff.clone(),
            throughput: self.throughput,
            remote_address: self.remote_address.clone(),
        }
    }
}

impl<A: Actor> Props<A> {
    /// Create props from an actor factory.
    pub fn new(factory: impl Fn() -> A + Send + Sync + 'static) -> Self {
        Self {
            factory: Arc::new(factory),
            name: None,
            backpressure: None,
            dispatch_class: None,
            strategy: Arc::new(AlwaysRestart),
            backoff: RestartBackoff::default(),
            throughput: None,
            remote_address: None,
        }
    }

    /// Register the actor under a name resolvable via the system.
    ///
    /// The name doubles as the class name for remote spawn.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the mailbox's backpressure configuration.
    pub fn with_backpressure(mut self, config: BackpressureConfig) -> Self {
        self.backpressure = Some(config);
        self
    }

    /// Pin the actor's turns to a dispatcher class.
    pub fn with_dispatch_class(mut self, class: TaskClass) -> Self {
        self.dispatch_class = Some(class);
        self
    }

    /// Set the supervisor strategy consulted on handler failures.
    pub fn with_strategy(mut self, strategy: impl SupervisorStrategy + 'static) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    /// Set the restart rate-limiting policy.
    pub fn with_backoff(mut self, backoff: RestartBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Override the per-turn message budget.
    pub fn with_throughput(mut self, budget: usize) -> Self {
        self.throughput = Some(budget);
        self
    }

    /// Request remote spawn on the system at `address` (delegated to the
    /// transport adapter).
    pub fn with_remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = Some(address.into());
        self
    }

    /// Build a fresh actor instance.
    pub(crate) fn make(&self) -> A {
        (self.factory)()
    }
}
