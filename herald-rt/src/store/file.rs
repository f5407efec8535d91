//! File-backed message store.
//!
//! Envelopes persist as individual JSON records under `messages/`; the
//! delivery-status map lives in a single `status.json`, rewritten on every
//! change with write-to-temp-then-atomic-rename so a crash never leaves a
//! torn status file.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;

// Layer 3: Internal module imports
use super::traits::{DeliveryState, MessageStore, StoreError};
use crate::message::{Message, MessageEnvelope};
use crate::util::{MessageId, Pid};

const MESSAGES_DIR: &str = "messages";
const STATUS_FILE: &str = "status.json";
const STATUS_TMP_FILE: &str = "status.json.tmp";

/// File-based store rooted at a directory.
///
/// The status map is cached in memory and guarded by an async mutex so
/// concurrent transitions serialize around the persist step.
pub struct FileMessageStore<M: Message> {
    root: PathBuf,
    status: Mutex<HashMap<MessageId, DeliveryState>>,
    _marker: PhantomData<M>,
}

impl<M: Message> FileMessageStore<M> {
    /// Open (or create) a store rooted at `root`, loading any existing
    /// status map.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(MESSAGES_DIR)).await?;

        let status_path = root.join(STATUS_FILE);
        let status = match fs::read(&status_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            root,
            status: Mutex::new(status),
            _marker: PhantomData,
        })
    }

    fn message_path(&self, id: &MessageId) -> PathBuf {
        self.root.join(MESSAGES_DIR).join(format!("{id}.json"))
    }

    /// Persist the status map: write the whole map to a temp file, then
    /// atomically rename it over the live one.
    async fn persist_status(
        &self,
        status: &HashMap<MessageId, DeliveryState>,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(status)?;
        let tmp_path = self.root.join(STATUS_TMP_FILE);
        fs::write(&tmp_path, &bytes).await?;
        fs::rename(&tmp_path, self.root.join(STATUS_FILE)).await?;
        Ok(())
    }
}

#[async_trait]
impl<M> MessageStore<M> for FileMessageStore<M>
where
    M: Message + Serialize + DeserializeOwned,
{
    async fn save(&self, envelope: &MessageEnvelope<M>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(envelope)?;
        fs::write(self.message_path(&envelope.message_id), &bytes).await?;

        let mut status = self.status.lock().await;
        status.insert(envelope.message_id, DeliveryState::Pending);
        self.persist_status(&status).await
    }

    async fn get(&self, id: &MessageId) -> Result<Option<MessageEnvelope<M>>, StoreError> {
        match fs::read(self.message_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, id: &MessageId) -> Result<(), StoreError> {
        match fs::remove_file(self.message_path(id)).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let mut status = self.status.lock().await;
        if status.remove(id).is_some() {
            self.persist_status(&status).await?;
        }
        Ok(())
    }

    async fn get_unacknowledged(
        &self,
        receiver: &Pid,
    ) -> Result<Vec<MessageEnvelope<M>>, StoreError> {
        let unacked: Vec<MessageId> = {
            let status = self.status.lock().await;
            status
                .iter()
                .filter(|(_, state)| **state != DeliveryState::Acknowledged)
                .map(|(id, _)| *id)
                .collect()
        };

        let mut envelopes = Vec::new();
        for id in unacked {
            if let Some(envelope) = self.get(&id).await? {
                if envelope
                    .receiver
                    .as_ref()
                    .is_some_and(|target| target.id() == receiver.id())
                {
                    envelopes.push(envelope);
                }
            }
        }
        Ok(envelopes)
    }

    async fn mark_as_delivered(&self, id: &MessageId) -> Result<(), StoreError> {
        self.set_status(id, DeliveryState::Delivered).await
    }

    async fn mark_as_acknowledged(&self, id: &MessageId) -> Result<(), StoreError> {
        self.set_status(id, DeliveryState::Acknowledged).await
    }

    async fn get_status(&self, id: &MessageId) -> Result<Option<DeliveryState>, StoreError> {
        Ok(self.status.lock().await.get(id).copied())
    }

    async fn set_status(&self, id: &MessageId, state: DeliveryState) -> Result<(), StoreError> {
        let mut status = self.status.lock().await;
        let current = *status.get(id).ok_or(StoreError::NotFound(*id))?;
        if !current.can_transition_to(state) {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: state,
            });
        }
        status.insert(*id, state);
        self.persist_status(&status).await
    }
}
