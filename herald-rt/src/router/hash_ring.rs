//! Consistent-hash ring with virtual nodes.
//!
//! Keys and nodes hash with the standard library's `DefaultHasher` (SipHash),
//! giving a stable, well-distributed 64-bit space without extra dependencies.
//! Each routee contributes `virtual_nodes` points on the ring; a key maps to
//! the first node at or clockwise after its hash. Removing a routee only
//! remaps the key ranges that landed on its points.

// Layer 1: Standard library imports
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::util::Pid;

/// Default virtual nodes per routee.
pub const DEFAULT_VIRTUAL_NODES: usize = 100;

fn hash_str(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Immutable hash ring built from a routee snapshot.
///
/// Rebuilt wholesale on any membership change; lookups against the same
/// ring are deterministic.
#[derive(Debug, Clone, Default)]
pub struct HashRing {
    ring: BTreeMap<u64, Pid>,
}

impl HashRing {
    /// Build a ring with `virtual_nodes` points per routee.
    ///
    /// Virtual node `v` of routee `p` hashes the string `"{p.id}:{v}"`.
    pub fn build(routees: &[Pid], virtual_nodes: usize) -> Self {
        let mut ring = BTreeMap::new();
        for pid in routees {
            for v in 0..virtual_nodes.max(1) {
                let point = format!("{}:{v}", pid.id());
                ring.insert(hash_str(&point), pid.clone());
            }
        }
        Self { ring }
    }

    /// Map a key to its routee: the first ring point with hash >= the key's
    /// hash, wrapping to the smallest point.
    pub fn lookup(&self, key: &str) -> Option<&Pid> {
        if self.ring.is_empty() {
            return None;
        }
        let hash = hash_str(key);
        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, pid)| pid)
    }

    /// Total points on the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether the ring has no points.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
