//! System-lane messages.
//!
//! The mailbox keeps two lanes. The system lane carries runtime control
//! signals plus any user envelope whose type tag marks it as system-grade;
//! everything on it is drained before user messages at every turn.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::envelope::MessageEnvelope;
use super::traits::Message;
use crate::util::Pid;

/// Runtime control signals delivered on the system lane.
#[derive(Debug, Clone)]
pub enum SystemSignal {
    /// The actor has been registered and may begin processing.
    Start,

    /// Stop the actor: drain system messages, reject user messages to dead
    /// letters, run `post_stop`.
    Stop,

    /// Supervisor-directed restart.
    Restart {
        /// Human-readable cause of the restart
        reason: String,
    },

    /// A child of this actor failed; the supervisor strategy decides.
    ChildFailed {
        /// The failed child
        child: Pid,
        /// Stringified failure cause
        reason: String,
        /// Restarts the child has already performed
        restart_count: u32,
    },

    /// A watched actor terminated.
    WatchTerminated(Pid),
}

/// One entry on the system lane: either a control signal or a user envelope
/// elevated by its type tag.
#[derive(Debug, Clone)]
pub enum SystemItem<M: Message> {
    /// Runtime control signal
    Signal(SystemSignal),

    /// User envelope whose type tag selects the system lane
    Message(MessageEnvelope<M>),
}

/// Lane selection rule: a type tag of `"error"`, or any tag starting with
/// `"system"`, is delivered on the system lane.
pub fn is_system_message_type(message_type: &str) -> bool {
    message_type == "error" || message_type.starts_with("system")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_tag_is_system() {
        assert!(is_system_message_type("error"));
    }

    #[test]
    fn test_system_prefix_is_system() {
        assert!(is_system_message_type("system"));
        assert!(is_system_message_type("system.watch"));
    }

    #[test]
    fn test_user_tags_are_not_system() {
        assert!(!is_system_message_type("echo"));
        assert!(!is_system_message_type("errors.report"));
        assert!(!is_system_message_type("sys"));
    }
}
