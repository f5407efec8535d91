//! Failure escalation and restart policy.

pub mod backoff;
pub mod directive;

pub use backoff::RestartBackoff;
pub use directive::{
    AlwaysEscalate, AlwaysRestart, AlwaysResume, AlwaysStop, Directive, Failure,
    SupervisorStrategy,
};
