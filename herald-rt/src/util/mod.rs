//! Shared utilities for the herald runtime.

pub mod ids;
pub mod serde_helpers;

pub use ids::{ActorId, MessageId, Pid};
pub use serde_helpers::duration_serde;
