//! Store contract and delivery-state machine.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Layer 3: Internal module imports
use crate::message::{Message, MessageEnvelope};
use crate::util::{MessageId, Pid};

/// Per-envelope delivery state.
///
/// Transitions are monotone along
/// `Pending -> Sent -> Delivered -> Acknowledged`, with `Failed` and
/// `Retrying` as side branches; a retry re-enters the chain at `Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryState {
    /// Saved, not yet offered to a mailbox
    Pending,

    /// Accepted by the target's admission control
    Sent,

    /// Dequeued by the target's turn
    Delivered,

    /// Explicitly acknowledged by the application
    Acknowledged,

    /// Delivery failed
    Failed,

    /// A retry is scheduled
    Retrying,
}

impl DeliveryState {
    /// Whether the transition to `next` is legal.
    pub fn can_transition_to(self, next: DeliveryState) -> bool {
        use DeliveryState::*;
        matches!(
            (self, next),
            (Pending, Sent)
                | (Sent, Delivered)
                | (Delivered, Acknowledged)
                | (Pending, Failed)
                | (Sent, Failed)
                | (Delivered, Failed)
                | (Failed, Retrying)
                | (Retrying, Sent)
                | (Retrying, Failed)
        )
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        self == DeliveryState::Acknowledged
    }
}

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record for the given id
    #[error("message {0} not found in store")]
    NotFound(MessageId),

    /// Illegal delivery-state transition
    #[error("invalid delivery-state transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state
        from: DeliveryState,
        /// Requested state
        to: DeliveryState,
    },

    /// Filesystem failure
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization failure
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Message store interface for durable delivery.
///
/// `save` registers an envelope in the `Pending` state; the remaining
/// methods advance or query its delivery state. Implementations must apply
/// the [`DeliveryState`] transition rules.
#[async_trait]
pub trait MessageStore<M: Message>: Send + Sync {
    /// Persist an envelope in the `Pending` state.
    async fn save(&self, envelope: &MessageEnvelope<M>) -> Result<(), StoreError>;

    /// Fetch an envelope by id.
    async fn get(&self, id: &MessageId) -> Result<Option<MessageEnvelope<M>>, StoreError>;

    /// Remove an envelope and its status. Idempotent.
    async fn delete(&self, id: &MessageId) -> Result<(), StoreError>;

    /// Envelopes addressed to `receiver` not yet acknowledged.
    async fn get_unacknowledged(
        &self,
        receiver: &Pid,
    ) -> Result<Vec<MessageEnvelope<M>>, StoreError>;

    /// Advance an envelope to `Delivered`.
    async fn mark_as_delivered(&self, id: &MessageId) -> Result<(), StoreError>;

    /// Advance an envelope to `Acknowledged`.
    async fn mark_as_acknowledged(&self, id: &MessageId) -> Result<(), StoreError>;

    /// Current delivery state, if the id is known.
    async fn get_status(&self, id: &MessageId) -> Result<Option<DeliveryState>, StoreError>;

    /// Apply an arbitrary (validated) state transition.
    async fn set_status(&self, id: &MessageId, state: DeliveryState) -> Result<(), StoreError>;
}
