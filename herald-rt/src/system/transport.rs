//! Transport adapter interface for remote delivery.
//!
//! The core never speaks a wire protocol. A transport adapter receives
//! envelopes addressed to remote pids (and remote-spawn requests) and is
//! free to implement any binding. Before an envelope is handed over, the
//! system rewrites local sender pids with its own address so replies route
//! back.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::errors::SystemError;
use crate::message::{Message, MessageEnvelope};
use crate::util::Pid;

/// Binding between this system and remote peers.
#[async_trait]
pub trait TransportAdapter<M: Message>: Send + Sync {
    /// Deliver an envelope to the system that owns `envelope.receiver`.
    async fn deliver(&self, envelope: MessageEnvelope<M>) -> Result<(), SystemError>;

    /// Ask the system at `address` to spawn an actor registered under
    /// `class_name`, returning the remote pid.
    async fn spawn_remote(&self, class_name: &str, address: &str) -> Result<Pid, SystemError>;
}
