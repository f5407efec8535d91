//! System-level error types.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::dispatch::DispatchError;
use crate::mailbox::DropKind;
use crate::store::StoreError;
use crate::util::Pid;

/// Errors surfaced by actor-system operations.
///
/// Handler failures never appear here: they stay inside the actor boundary
/// as supervision events. What does surface is what the caller can act on:
/// delivery failures (also routed to dead letters), admission rejections,
/// request timeouts, and lifecycle errors.
#[derive(Error, Debug)]
pub enum SystemError {
    /// Target pid is not registered; the envelope went to dead letters
    #[error("actor not found: {0}")]
    ActorNotFound(Pid),

    /// Target actor has stopped; the envelope went to dead letters
    #[error("actor stopped: {0}")]
    ActorStopped(Pid),

    /// `pre_start` failed; the actor was removed before this surfaced
    #[error("actor start failed: {0}")]
    StartFailure(String),

    /// Admission control rejected the envelope (DropNew or Wait timeout)
    #[error("message dropped by backpressure ({kind})")]
    MessageDropped {
        /// Drop category
        kind: DropKind,
    },

    /// Queue at capacity under the Throw strategy
    #[error("queue full: size {size}, max {max}")]
    QueueFull {
        /// Pending size at submit time
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Request deadline exceeded; a late response is silently dropped
    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// The requesting actor stopped while the request was pending
    #[error("request cancelled")]
    RequestCancelled,

    /// Supervisor-directed restart failed; escalated upward
    #[error("restart failed for {actor}: {reason}")]
    RestartFailure {
        /// The actor whose restart failed
        actor: Pid,
        /// Why the restart failed
        reason: String,
    },

    /// Remote pid with no transport adapter configured
    #[error("no transport adapter configured for remote address {0}")]
    NoTransport(String),

    /// Spawn-by-name with no factory registered under that class name
    #[error("no actor factory registered for class {0}")]
    UnknownClass(String),

    /// System shutdown in progress
    #[error("system shutdown in progress")]
    ShuttingDown,

    /// Shutdown did not complete within the configured timeout
    #[error("shutdown timeout exceeded after {0:?}")]
    ShutdownTimeout(Duration),

    /// Configuration validation error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Dispatcher rejected a task
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Message store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SystemError {
    /// Transient errors may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SystemError::MessageDropped { .. }
                | SystemError::QueueFull { .. }
                | SystemError::RequestTimeout(_)
        )
    }

    /// Fatal errors mean the system cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SystemError::ShuttingDown | SystemError::ShutdownTimeout(_)
        )
    }

    /// Recoverable errors can be handled without stopping the system.
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }
}
