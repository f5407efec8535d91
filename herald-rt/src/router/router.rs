//! Router over a duplicate-free routee set.
//!
//! Membership changes rebuild a copy-on-write snapshot (routee list, hash
//! ring, weighted plan) behind one lock, so `route` always observes a
//! consistent view and never returns a removed routee.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Layer 3: Internal module imports
use super::hash_ring::{HashRing, DEFAULT_VIRTUAL_NODES};
use crate::message::{Message, MessageEnvelope};
use crate::util::Pid;

/// Hash-key extractor for consistent-hash routing.
pub type HashKeyFn<M> = Arc<dyn Fn(&MessageEnvelope<M>) -> String + Send + Sync>;

/// Selection strategy for a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RouterStrategy {
    /// Monotonic index modulo the routee count.
    #[default]
    RoundRobin,

    /// Uniform random selection.
    Random,

    /// Select the full routee set; the caller sends to each.
    Broadcast,

    /// Virtual-node consistent hashing over a per-message key.
    ConsistentHash,

    /// Round-robin over a plan proportional to routee weights.
    WeightedRoundRobin,
}

/// One routee with its weight (weights only matter to the weighted
/// strategy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routee {
    /// Target pid
    pub pid: Pid,

    /// Relative weight, >= 1
    pub weight: u32,
}

/// What `route` selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSelection {
    /// A single target
    One(Pid),

    /// The whole set (broadcast)
    Many(Vec<Pid>),
}

/// Router errors.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The routee set is empty
    #[error("router has no routees")]
    NoRoutees,
}

/// Derived tables rebuilt together on every membership change.
struct Tables {
    routees: Vec<Routee>,
    ring: HashRing,
    plan: Vec<usize>,
}

impl Tables {
    fn rebuild(routees: Vec<Routee>, virtual_nodes: usize) -> Self {
        let pids: Vec<Pid> = routees.iter().map(|r| r.pid.clone()).collect();
        let ring = HashRing::build(&pids, virtual_nodes);

        // Interleaved proportional plan: a routee with weight w appears in w
        // of the first max_weight rounds, spreading heavy routees instead of
        // clustering them.
        let max_weight = routees.iter().map(|r| r.weight).max().unwrap_or(0);
        let mut plan = Vec::new();
        for round in 0..max_weight {
            for (index, routee) in routees.iter().enumerate() {
                if routee.weight > round {
                    plan.push(index);
                }
            }
        }

        Self {
            routees,
            ring,
            plan,
        }
    }
}

/// Groups a set of routee pids and selects targets per message.
///
/// # Example
/// ```rust
/// use herald_rt::message::{Message, MessageEnvelope};
/// use herald_rt::router::{RouteSelection, Router, RouterStrategy};
/// use herald_rt::util::Pid;
///
/// #[derive(Debug, Clone)]
/// struct Job;
/// impl Message for Job {
///     fn message_type(&self) -> &str {
///         "job"
///     }
/// }
///
/// let router = Router::<Job>::new(RouterStrategy::RoundRobin);
/// let r1 = Pid::local();
/// let r2 = Pid::local();
/// router.add_routee(r1.clone());
/// router.add_routee(r2.clone());
///
/// let selection = router.route(&MessageEnvelope::new(Job)).unwrap();
/// assert_eq!(selection, RouteSelection::One(r1));
/// ```
pub struct Router<M: Message> {
    strategy: RouterStrategy,
    tables: RwLock<Arc<Tables>>,
    next: AtomicUsize,
    virtual_nodes: usize,
    key_fn: Option<HashKeyFn<M>>,
}

impl<M: Message> Router<M> {
    /// Create an empty router with the given strategy.
    pub fn new(strategy: RouterStrategy) -> Self {
        Self {
            strategy,
            tables: RwLock::new(Arc::new(Tables::rebuild(Vec::new(), DEFAULT_VIRTUAL_NODES))),
            next: AtomicUsize::new(0),
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            key_fn: None,
        }
    }

    /// Override the virtual-node count for consistent hashing.
    pub fn with_virtual_nodes(mut self, virtual_nodes: usize) -> Self {
        self.virtual_nodes = virtual_nodes.max(1);
        self
    }

    /// Supply a custom hash-key extractor (default: the envelope id).
    pub fn with_hash_key_fn(
        mut self,
        key_fn: impl Fn(&MessageEnvelope<M>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    /// The configured strategy.
    pub fn strategy(&self) -> RouterStrategy {
        self.strategy
    }

    /// Add a routee with weight 1. No-op (returns false) if the id is
    /// already present.
    pub fn add_routee(&self, pid: Pid) -> bool {
        self.add_routee_weighted(pid, 1)
    }

    /// Add a weighted routee. No-op (returns false) if the id is already
    /// present.
    pub fn add_routee_weighted(&self, pid: Pid, weight: u32) -> bool {
        let mut tables = self.tables.write();
        if tables.routees.iter().any(|r| r.pid.id() == pid.id()) {
            return false;
        }
        let mut routees = tables.routees.clone();
        routees.push(Routee {
            pid,
            weight: weight.max(1),
        });
        *tables = Arc::new(Tables::rebuild(routees, self.virtual_nodes));
        true
    }

    /// Remove a routee by id. Returns false if it was not present.
    ///
    /// The round-robin index is clamped into the remaining set so fairness
    /// is preserved across the survivors.
    pub fn remove_routee(&self, pid: &Pid) -> bool {
        let mut tables = self.tables.write();
        let before = tables.routees.len();
        let routees: Vec<Routee> = tables
            .routees
            .iter()
            .filter(|r| r.pid.id() != pid.id())
            .cloned()
            .collect();
        if routees.len() == before {
            return false;
        }

        let len = routees.len();
        if len > 0 {
            let _ = self
                .next
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some(i % len));
        }
        *tables = Arc::new(Tables::rebuild(routees, self.virtual_nodes));
        true
    }

    /// Snapshot of the current routee pids, in insertion order.
    pub fn routees(&self) -> Vec<Pid> {
        self.tables
            .read()
            .routees
            .iter()
            .map(|r| r.pid.clone())
            .collect()
    }

    /// Select the target(s) for an envelope.
    pub fn route(&self, envelope: &MessageEnvelope<M>) -> Result<RouteSelection, RouterError> {
        let tables = Arc::clone(&self.tables.read());
        let len = tables.routees.len();
        if len == 0 {
            return Err(RouterError::NoRoutees);
        }

        let selection = match self.strategy {
            RouterStrategy::RoundRobin => {
                let index = self.next.fetch_add(1, Ordering::AcqRel) % len;
                RouteSelection::One(tables.routees[index].pid.clone())
            }
            RouterStrategy::Random => {
                let index = rand::thread_rng().gen_range(0..len);
                RouteSelection::One(tables.routees[index].pid.clone())
            }
            RouterStrategy::Broadcast => {
                RouteSelection::Many(tables.routees.iter().map(|r| r.pid.clone()).collect())
            }
            RouterStrategy::ConsistentHash => {
                let key = match &self.key_fn {
                    Some(key_fn) => key_fn(envelope),
                    None => envelope.message_id.to_string(),
                };
                match tables.ring.lookup(&key) {
                    Some(pid) => RouteSelection::One(pid.clone()),
                    None => return Err(RouterError::NoRoutees),
                }
            }
            RouterStrategy::WeightedRoundRobin => {
                let plan = &tables.plan;
                if plan.is_empty() {
                    return Err(RouterError::NoRoutees);
                }
                let slot = self.next.fetch_add(1, Ordering::AcqRel) % plan.len();
                RouteSelection::One(tables.routees[plan[slot]].pid.clone())
            }
        };

        Ok(selection)
    }
}
