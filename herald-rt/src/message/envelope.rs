// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::traits::{Message, MessagePriority};
use crate::util::{MessageId, Pid};

/// Routing and correlation metadata carried by every envelope.
///
/// Everything except `priority` defaults to empty; builder methods on
/// [`MessageEnvelope`] fill the fields relevant to a given send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Message priority (extracted from the payload at creation)
    pub priority: MessagePriority,

    /// Optional time-to-live in milliseconds
    pub ttl_ms: Option<u64>,

    /// Optional correlation ID for request/response tracking
    pub correlation_id: Option<Uuid>,

    /// Optional causation ID linking this envelope to the one that caused it
    pub causation_id: Option<Uuid>,

    /// Optional deduplication key for store-backed delivery
    pub deduplication_id: Option<String>,

    /// Number of delivery attempts made for this envelope
    pub delivery_attempt: u32,

    /// Marks the envelope as the request half of a request/response exchange
    pub is_request: bool,

    /// Marks the envelope as the response half of a request/response exchange
    pub is_response: bool,

    /// Where the response to this envelope should be sent
    pub reply_to: Option<Pid>,
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            priority: MessagePriority::Normal,
            ttl_ms: None,
            correlation_id: None,
            causation_id: None,
            deduplication_id: None,
            delivery_attempt: 0,
            is_request: false,
            is_response: false,
            reply_to: None,
        }
    }
}

/// Generic message envelope.
///
/// The envelope is generic over the message type `M`, ensuring compile-time
/// type safety without runtime dispatch or type erasure. It carries the
/// payload together with identity, routing, and correlation metadata; the
/// runtime never inspects the payload beyond [`Message::message_type`] and
/// [`Message::priority`].
///
/// # Invariants
///
/// - `message_id` is unique per envelope.
/// - `receiver` is set for every routed envelope (the system sets it on
///   send if the caller did not).
/// - `timestamp` is monotone per sender (it is taken at creation time).
///
/// # Example
/// ```rust
/// use herald_rt::message::{Message, MessageEnvelope};
/// use herald_rt::util::Pid;
///
/// #[derive(Debug, Clone)]
/// struct Ping;
///
/// impl Message for Ping {
///     fn message_type(&self) -> &str {
///         "ping"
///     }
/// }
///
/// let sender = Pid::local();
/// let envelope = MessageEnvelope::new(Ping)
///     .with_sender(sender)
///     .with_ttl_ms(60_000);
///
/// assert_eq!(envelope.message_type(), "ping");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<M: Message> {
    /// Unique envelope identifier
    pub message_id: MessageId,

    /// Optional sender pid for reply capability
    pub sender: Option<Pid>,

    /// Target pid; set by the system on send when absent
    pub receiver: Option<Pid>,

    /// The actual message payload
    pub payload: M,

    /// Routing and correlation metadata
    pub metadata: MessageMetadata,

    /// Envelope creation timestamp
    pub timestamp: DateTime<Utc>,
}

impl<M: Message> MessageEnvelope<M> {
    /// Create a new envelope around a payload.
    ///
    /// The payload's priority is captured into the metadata.
    pub fn new(payload: M) -> Self {
        let priority = payload.priority();
        Self {
            message_id: MessageId::new(),
            sender: None,
            receiver: None,
            payload,
            metadata: MessageMetadata {
                priority,
                ..MessageMetadata::default()
            },
            timestamp: Utc::now(),
        }
    }

    /// Builder method: set the sender pid.
    pub fn with_sender(mut self, sender: Pid) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Builder method: set the receiver pid.
    pub fn with_receiver(mut self, receiver: Pid) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Builder method: set the correlation ID.
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.metadata.correlation_id = Some(id);
        self
    }

    /// Builder method: set the causation ID.
    pub fn with_causation_id(mut self, id: Uuid) -> Self {
        self.metadata.causation_id = Some(id);
        self
    }

    /// Builder method: set the deduplication key.
    pub fn with_deduplication_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.deduplication_id = Some(id.into());
        self
    }

    /// Builder method: set the time-to-live in milliseconds.
    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.metadata.ttl_ms = Some(ttl_ms);
        self
    }

    /// Builder method: override the priority captured from the payload.
    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.metadata.priority = priority;
        self
    }

    /// Builder method: set the reply-to pid.
    pub fn with_reply_to(mut self, reply_to: Pid) -> Self {
        self.metadata.reply_to = Some(reply_to);
        self
    }

    /// Build the response envelope for a request.
    ///
    /// Addresses the new envelope at the request's `reply_to` (falling back
    /// to its sender), copies the correlation id, links causation to the
    /// request's message id, and marks the envelope as a response.
    pub fn response_to(request: &MessageEnvelope<M>, payload: M) -> Self {
        let mut envelope = Self::new(payload);
        envelope.receiver = request
            .metadata
            .reply_to
            .clone()
            .or_else(|| request.sender.clone());
        envelope.metadata.correlation_id = request.metadata.correlation_id;
        envelope.metadata.causation_id = Some(*request.message_id.as_uuid());
        envelope.metadata.is_response = true;
        envelope
    }

    /// Check whether the envelope has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        if let Some(ttl_ms) = self.metadata.ttl_ms {
            let age = Utc::now()
                .signed_duration_since(self.timestamp)
                .num_milliseconds();
            age > ttl_ms as i64
        } else {
            false
        }
    }

    /// Get the message type tag of the payload.
    pub fn message_type(&self) -> &str {
        self.payload.message_type()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    enum TestMessage {
        Echo { value: u32 },
        Urgent,
    }

    impl Message for TestMessage {
        fn message_type(&self) -> &str {
            match self {
                TestMessage::Echo { .. } => "echo",
                TestMessage::Urgent => "urgent",
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
    fn test_envelope_creation() {
        let envelope = MessageEnvelope::new(TestMessage::Echo { value: 1 });

        assert_eq!(envelope.message_type(), "echo");
        assert_eq!(envelope.metadata.priority, MessagePriority::Normal);
        assert!(envelope.sender.is_none());
        assert!(envelope.receiver.is_none());
        assert!(envelope.metadata.correlation_id.is_none());
        assert_eq!(envelope.metadata.delivery_attempt, 0);
        assert!(!envelope.metadata.is_request);
        assert!(!envelope.metadata.is_response);
    }

    #[test]
    fn test_envelope_ids_unique() {
        let e1 = MessageEnvelope::new(TestMessage::Urgent);
        let e2 = MessageEnvelope::new(TestMessage::Urgent);

        assert_ne!(e1.message_id, e2.message_id);
    }

    #[test]
    fn test_priority_captured_from_payload() {
        let envelope = MessageEnvelope::new(TestMessage::Urgent);
        assert_eq!(envelope.metadata.priority, MessagePriority::High);
    }

    #[test]
    fn test_builder_chaining() {
        let sender = Pid::local();
        let receiver = Pid::local();
        let correlation = Uuid::new_v4();

        let envelope = MessageEnvelope::new(TestMessage::Echo { value: 2 })
            .with_sender(sender.clone())
            .with_receiver(receiver.clone())
            .with_correlation_id(correlation)
            .with_deduplication_id("dedup-1")
            .with_ttl_ms(120_000);

        assert_eq!(envelope.sender, Some(sender));
        assert_eq!(envelope.receiver, Some(receiver));
        assert_eq!(envelope.metadata.correlation_id, Some(correlation));
        assert_eq!(envelope.metadata.deduplication_id.as_deref(), Some("dedup-1"));
        assert_eq!(envelope.metadata.ttl_ms, Some(120_000));
    }

    #[test]
    fn test_response_to_copies_correlation() {
        let requester = Pid::local();
        let request = MessageEnvelope::new(TestMessage::Echo { value: 5 })
            .with_correlation_id(Uuid::new_v4())
            .with_reply_to(requester.clone());

        let response =
            MessageEnvelope::response_to(&request, TestMessage::Echo { value: 5 });

        assert_eq!(response.receiver, Some(requester));
        assert_eq!(
            response.metadata.correlation_id,
            request.metadata.correlation_id
        );
        assert_eq!(
            response.metadata.causation_id,
            Some(*request.message_id.as_uuid())
        );
        assert!(response.metadata.is_response);
    }

    #[test]
    fn test_ttl_not_expired_when_fresh() {
        let envelope = MessageEnvelope::new(TestMessage::Urgent).with_ttl_ms(10_000);
        assert!(!envelope.is_expired());
    }

    #[test]
    fn test_ttl_no_expiration_when_none() {
        let mut envelope = MessageEnvelope::new(TestMessage::Urgent);
        envelope.timestamp = Utc::now() - chrono::Duration::seconds(100);

        assert!(!envelope.is_expired());
    }

    #[test]
    fn test_ttl_expired() {
        let mut envelope = MessageEnvelope::new(TestMessage::Urgent).with_ttl_ms(1_000);
        envelope.timestamp = Utc::now() - chrono::Duration::seconds(5);

        assert!(envelope.is_expired());
    }

    #[test]
    fn test_envelope_serde_round_trip() {
        let original = MessageEnvelope::new(TestMessage::Echo { value: 9 })
            .with_sender(Pid::local())
            .with_receiver(Pid::remote("node-1"))
            .with_correlation_id(Uuid::new_v4());

        let json = serde_json::to_string(&original).unwrap();
        let back: MessageEnvelope<TestMessage> = serde_json::from_str(&json).unwrap();

        assert_eq!(back.message_id, original.message_id);
        assert_eq!(back.sender, original.sender);
        assert_eq!(back.receiver, original.receiver);
        assert_eq!(back.metadata, original.metadata);
        assert_eq!(back.payload, original.payload);
    }
}
