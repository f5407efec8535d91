//! Strategy-based fan-out and selection over a routee set.

pub mod hash_ring;
pub mod router;

pub use hash_ring::{HashRing, DEFAULT_VIRTUAL_NODES};
pub use router::{RouteSelection, Routee, Router, RouterError, RouterStrategy};
