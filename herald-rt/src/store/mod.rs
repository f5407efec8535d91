//! Pluggable message persistence for durable delivery.
//!
//! The core never requires a store; when one is attached, the system records
//! best-effort delivery-state transitions through it. Exactly-once semantics
//! need coordination with the store and are not enforced by the core alone.

pub mod file;
pub mod in_memory;
pub mod traits;

pub use file::FileMessageStore;
pub use in_memory::InMemoryMessageStore;
pub use traits::{DeliveryState, MessageStore, StoreError};
