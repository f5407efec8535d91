//! Resolved-target cache and batch-send grouping.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::message::{Message, MessageEnvelope};
use crate::util::Pid;

/// Concurrent batches allowed by `send_batch`.
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 10;

/// Batches smaller than this take the direct-send path.
pub const DIRECT_SEND_THRESHOLD: usize = 5;

/// How a pid resolves for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Registered in the local system
    Local,

    /// Routed through the transport adapter
    Remote,
}

/// Cache of resolved targets keyed by `id@address` (empty address for
/// local pids). Invalidated on actor stop.
#[derive(Default)]
pub struct TargetCache {
    map: DashMap<String, ResolvedTarget>,
}

impl TargetCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a pid, resolving and caching on miss.
    pub fn resolve_with(
        &self,
        pid: &Pid,
        resolve: impl FnOnce() -> ResolvedTarget,
    ) -> ResolvedTarget {
        *self.map.entry(pid.cache_key()).or_insert_with(resolve)
    }

    /// Drop the cached resolution for a pid (actor stopped).
    pub fn invalidate(&self, pid: &Pid) {
        self.map.remove(&pid.cache_key());
    }

    /// Number of cached resolutions.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Pair targets with envelopes and group by target id.
///
/// Groups keep first-seen target order, and envelopes keep their submission
/// order within each group, preserving same-sender-same-receiver FIFO. The
/// shorter of the two slices bounds the pairing.
pub fn group_by_target<M: Message>(
    targets: &[Pid],
    envelopes: Vec<MessageEnvelope<M>>,
) -> Vec<(Pid, Vec<MessageEnvelope<M>>)> {
    let mut groups: Vec<(Pid, Vec<MessageEnvelope<M>>)> = Vec::new();
    for (target, envelope) in targets.iter().zip(envelopes) {
        match groups
            .iter_mut()
            .find(|(pid, _)| pid.cache_key() == target.cache_key())
        {
            Some((_, batch)) => batch.push(envelope),
            None => groups.push((target.clone(), vec![envelope])),
        }
    }
    groups
}
