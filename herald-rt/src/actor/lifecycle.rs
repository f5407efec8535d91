//! Actor lifecycle state machine.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::Serialize;

// Layer 3: Internal module imports
// (none)

/// Actor state in the lifecycle state machine.
///
/// # State Transitions
///
/// ```text
/// Created -> Started -> Running <-> Restarting
///                          |
///                          v
///                      Stopping -> Stopped
/// ```
///
/// `Started` is entered after a successful `pre_start`; `Running` once the
/// actor is registered and processing. `Restarting` alternates with
/// `Running` under supervisor-directed restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActorState {
    /// Instantiated, `pre_start` not yet run.
    Created,

    /// `pre_start` completed.
    Started,

    /// Registered and processing messages.
    Running,

    /// Supervisor-directed restart in progress.
    Restarting,

    /// Stop requested; draining system messages.
    Stopping,

    /// Terminal state.
    Stopped,
}

impl Default for ActorState {
    fn default() -> Self {
        Self::Created
    }
}

impl ActorState {
    /// Whether the transition to `next` is legal.
    pub fn can_transition_to(self, next: ActorState) -> bool {
        use ActorState::*;
        matches!(
            (self, next),
            (Created, Started)
                | (Started, Running)
                | (Running, Restarting)
                | (Restarting, Running)
                | (Created, Stopping)
                | (Started, Stopping)
                | (Running, Stopping)
                | (Restarting, Stopping)
                | (Stopping, Stopped)
        )
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        self == ActorState::Stopped
    }
}

/// Lifecycle tracker with state, transition timestamps, and restart count.
#[derive(Debug, Clone)]
pub struct ActorLifecycle {
    state: ActorState,
    last_state_change: DateTime<Utc>,
    restart_count: u32,
}

impl Default for ActorLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorLifecycle {
    /// Create a tracker in the Created state.
    pub fn new() -> Self {
        Self {
            state: ActorState::Created,
            last_state_change: Utc::now(),
            restart_count: 0,
        }
    }

    /// Transition to a new state.
    ///
    /// Illegal transitions are ignored and return false. Entering
    /// `Restarting` increments the restart count.
    pub fn transition_to(&mut self, next: ActorState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        self.last_state_change = Utc::now();
        if next == ActorState::Restarting {
            self.restart_count += 1;
        }
        true
    }

    /// Current state.
    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Timestamp of the last transition.
    pub fn last_state_change(&self) -> DateTime<Utc> {
        self.last_state_change
    }

    /// Number of restarts performed.
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }
}
