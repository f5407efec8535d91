// Layer 1: Standard library imports
use std::fmt::Debug;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Core message trait implemented by the application's message type.
///
/// A herald system is generic over one message type, typically a sum type
/// over the envelope kinds the application exchanges. The runtime treats the
/// payload as opaque; the only things it asks of a message are a type tag
/// (used for lane selection and observability) and a routing priority.
///
/// # Example
/// ```rust
/// use herald_rt::message::{Message, MessagePriority};
///
/// #[derive(Debug, Clone)]
/// enum WorkerMsg {
///     Job { id: u64 },
///     Flush,
/// }
///
/// impl Message for WorkerMsg {
///     fn message_type(&self) -> &str {
///         match self {
///             WorkerMsg::Job { .. } => "worker.job",
///             WorkerMsg::Flush => "worker.flush",
///         }
///     }
///
///     fn priority(&self) -> MessagePriority {
///         match self {
///             WorkerMsg::Flush => MessagePriority::High,
///             _ => MessagePriority::Normal,
///         }
///     }
/// }
/// ```
pub trait Message: Send + Sync + Clone + Debug + 'static {
    /// Message type tag for this value.
    ///
    /// Tags equal to `"error"` or starting with `"system"` are delivered on
    /// the mailbox's system lane and overtake user messages at the lane
    /// boundary.
    fn message_type(&self) -> &str;

    /// Message routing priority (default: Normal).
    ///
    /// The priority is captured into the envelope at creation time and feeds
    /// both mailbox admission and dispatcher task classification.
    fn priority(&self) -> MessagePriority {
        MessagePriority::Normal
    }
}

/// Message priority levels for routing and processing.
///
/// # Priority Ordering
/// Critical > High > Normal > Low
///
/// # Example
/// ```rust
/// use herald_rt::message::MessagePriority;
///
/// assert!(MessagePriority::Critical > MessagePriority::High);
/// assert!(MessagePriority::High > MessagePriority::Normal);
/// assert!(MessagePriority::Normal > MessagePriority::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessagePriority {
    /// Background processing (lowest priority).
    Low = 0,

    /// Default priority for normal messages.
    Normal = 1,

    /// High priority for time-sensitive messages.
    High = 2,

    /// Highest priority, reserved for system-critical messages.
    Critical = 3,
}

impl Default for MessagePriority {
    fn default() -> Self {
        Self::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    enum TestMessage {
        Plain,
        Urgent,
    }

    impl Message for TestMessage {
        fn message_type(&self) -> &str {
            match self {
                TestMessage::Plain => "test.plain",
                TestMessage::Urgent => "test.urgent",
            }
        }

        fn priority(&self) -> MessagePriority {
            match self {
                TestMessage::Urgent => MessagePriority::High,
                _ => MessagePriority::Normal,
            }
        }
    }

    #[test]
    fn test_message_type_per_value() {
        assert_eq!(TestMessage::Plain.message_type(), "test.plain");
        assert_eq!(TestMessage::Urgent.message_type(), "test.urgent");
    }

    #[test]
    fn test_priority_per_value() {
        assert_eq!(TestMessage::Plain.priority(), MessagePriority::Normal);
        assert_eq!(TestMessage::Urgent.priority(), MessagePriority::High);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(MessagePriority::Critical > MessagePriority::High);
        assert!(MessagePriority::High > MessagePriority::Normal);
        assert!(MessagePriority::Normal > MessagePriority::Low);
    }

    #[test]
    fn test_priority_default() {
        assert_eq!(MessagePriority::default(), MessagePriority::Normal);
    }
}
