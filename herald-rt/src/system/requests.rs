//! Pending-request table for request/response correlation.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

// Layer 3: Internal module imports
use crate::message::Message;
use crate::util::Pid;

/// How a pending request resolved.
#[derive(Debug)]
pub(crate) enum RequestOutcome<M: Message> {
    /// A correlated response arrived
    Reply(M),

    /// The requesting actor stopped while the request was pending
    Cancelled,
}

struct PendingRequest<M: Message> {
    tx: oneshot::Sender<RequestOutcome<M>>,
    origin: Option<Pid>,
}

/// Map from correlation id to its single resolver.
///
/// Each id has exactly one outcome: a reply, a timeout (the caller removes
/// the entry), or a cancellation. A response for a missing id is a late
/// response and is dropped by the caller.
pub(crate) struct PendingRequests<M: Message> {
    entries: DashMap<Uuid, PendingRequest<M>>,
}

impl<M: Message> PendingRequests<M> {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register a resolver for a fresh correlation id.
    pub(crate) fn register(
        &self,
        correlation: Uuid,
        origin: Option<Pid>,
    ) -> oneshot::Receiver<RequestOutcome<M>> {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(correlation, PendingRequest { tx, origin });
        rx
    }

    /// Complete a resolver with a reply payload.
    ///
    /// Returns false when no resolver is registered (late response).
    pub(crate) fn complete(&self, correlation: &Uuid, payload: M) -> bool {
        match self.entries.remove(correlation) {
            Some((_, pending)) => pending.tx.send(RequestOutcome::Reply(payload)).is_ok(),
            None => false,
        }
    }

    /// Remove a resolver without completing it (timeout path).
    pub(crate) fn remove(&self, correlation: &Uuid) -> bool {
        self.entries.remove(correlation).is_some()
    }

    /// Cancel every request originated by a stopping actor.
    pub(crate) fn cancel_for_origin(&self, origin: &Pid) {
        let cancelled: Vec<Uuid> = self
            .entries
            .iter()
            .filter(|entry| {
                entry
                    .origin
                    .as_ref()
                    .is_some_and(|o| o.id() == origin.id())
            })
            .map(|entry| *entry.key())
            .collect();

        for correlation in cancelled {
            if let Some((_, pending)) = self.entries.remove(&correlation) {
                let _ = pending.tx.send(RequestOutcome::Cancelled);
            }
        }
    }

    /// Number of requests awaiting resolution.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
