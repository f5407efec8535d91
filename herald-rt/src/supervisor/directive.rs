//! Supervision directives and strategies.
//!
//! When a handler fails, the owning actor's supervisor strategy inspects the
//! failure and returns a directive. Failures never propagate past the actor
//! boundary; they become supervision events.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::util::Pid;

/// Supervisor decision for a failed actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Directive {
    /// Keep state and continue with the next message.
    Resume,

    /// Reset state via the actor factory and re-run the start sequence.
    /// The remaining messages of the interrupted turn stay in the mailbox
    /// and are processed by the fresh instance on its next turn.
    #[default]
    Restart,

    /// Terminate the actor and its descendants; pending user messages route
    /// to the dead-letter sink.
    Stop,

    /// Re-raise the failure to the grandparent supervisor.
    Escalate,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resume => write!(f, "Resume"),
            Self::Restart => write!(f, "Restart"),
            Self::Stop => write!(f, "Stop"),
            Self::Escalate => write!(f, "Escalate"),
        }
    }
}

/// A handler failure as seen by a supervisor strategy.
///
/// The concrete handler error is stringified at the actor boundary so that
/// strategies compose across actors with different error types.
#[derive(Debug, Clone)]
pub struct Failure {
    /// The actor whose handler failed
    pub actor: Pid,

    /// Stringified cause
    pub reason: String,

    /// Restarts already performed for this actor
    pub restart_count: u32,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "actor {} failed (restart {}): {}",
            self.actor, self.restart_count, self.reason
        )
    }
}

/// Strategy consulted on every failure of the supervised actor.
///
/// Any `Fn(&Failure) -> Directive` closure is a strategy:
///
/// ```rust
/// use herald_rt::supervisor::{Directive, Failure, SupervisorStrategy};
///
/// let strategy = |failure: &Failure| {
///     if failure.restart_count < 3 {
///         Directive::Restart
///     } else {
///         Directive::Stop
///     }
/// };
///
/// let failure = Failure {
///     actor: herald_rt::util::Pid::local(),
///     reason: "boom".to_string(),
///     restart_count: 5,
/// };
/// assert_eq!(strategy.decide(&failure), Directive::Stop);
/// ```
pub trait SupervisorStrategy: Send + Sync {
    /// Choose a directive for the failure.
    fn decide(&self, failure: &Failure) -> Directive;
}

impl<F> SupervisorStrategy for F
where
    F: Fn(&Failure) -> Directive + Send + Sync,
{
    fn decide(&self, failure: &Failure) -> Directive {
        self(failure)
    }
}

/// Always restart the failed actor (the root default).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRestart;

impl SupervisorStrategy for AlwaysRestart {
    fn decide(&self, _failure: &Failure) -> Directive {
        Directive::Restart
    }
}

/// Always keep state and continue.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysResume;

impl SupervisorStrategy for AlwaysResume {
    fn decide(&self, _failure: &Failure) -> Directive {
        Directive::Resume
    }
}

/// Always stop the failed actor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysStop;

impl SupervisorStrategy for AlwaysStop {
    fn decide(&self, _failure: &Failure) -> Directive {
        Directive::Stop
    }
}

/// Always escalate to the grandparent.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysEscalate;

impl SupervisorStrategy for AlwaysEscalate {
    fn decide(&self, _failure: &Failure) -> Directive {
        Directive::Escalate
    }
}
