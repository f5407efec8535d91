//! In-memory message store.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;

// Layer 3: Internal module imports
use super::traits::{DeliveryState, MessageStore, StoreError};
use crate::message::{Message, MessageEnvelope};
use crate::util::{MessageId, Pid};

struct StoredRecord<M: Message> {
    envelope: MessageEnvelope<M>,
    state: DeliveryState,
}

/// Concurrent in-memory store, suitable for tests and single-process
/// durability across restarts of individual actors.
#[derive(Default)]
pub struct InMemoryMessageStore<M: Message> {
    records: DashMap<MessageId, StoredRecord<M>>,
}

impl<M: Message> InMemoryMessageStore<M> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Number of stored envelopes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl<M: Message> MessageStore<M> for InMemoryMessageStore<M> {
    async fn save(&self, envelope: &MessageEnvelope<M>) -> Result<(), StoreError> {
        self.records.insert(
            envelope.message_id,
            StoredRecord {
                envelope: envelope.clone(),
                state: DeliveryState::Pending,
            },
        );
        Ok(())
    }

    async fn get(&self, id: &MessageId) -> Result<Option<MessageEnvelope<M>>, StoreError> {
        Ok(self.records.get(id).map(|r| r.envelope.clone()))
    }

    async fn delete(&self, id: &MessageId) -> Result<(), StoreError> {
        self.records.remove(id);
        Ok(())
    }

    async fn get_unacknowledged(
        &self,
        receiver: &Pid,
    ) -> Result<Vec<MessageEnvelope<M>>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| {
                r.state != DeliveryState::Acknowledged
                    && r.envelope
                        .receiver
                        .as_ref()
                        .is_some_and(|target| target.id() == receiver.id())
            })
            .map(|r| r.envelope.clone())
            .collect())
    }

    async fn mark_as_delivered(&self, id: &MessageId) -> Result<(), StoreError> {
        self.set_status(id, DeliveryState::Delivered).await
    }

    async fn mark_as_acknowledged(&self, id: &MessageId) -> Result<(), StoreError> {
        self.set_status(id, DeliveryState::Acknowledged).await
    }

    async fn get_status(&self, id: &MessageId) -> Result<Option<DeliveryState>, StoreError> {
        Ok(self.records.get(id).map(|r| r.state))
    }

    async fn set_status(&self, id: &MessageId, state: DeliveryState) -> Result<(), StoreError> {
        let mut record = self.records.get_mut(id).ok_or(StoreError::NotFound(*id))?;
        if !record.state.can_transition_to(state) {
            return Err(StoreError::InvalidTransition {
                from: record.state,
                to: state,
            });
        }
        record.state = state;
        Ok(())
    }
}
