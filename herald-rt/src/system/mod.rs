//! Root registry: spawn/stop/send/broadcast/request and system lifecycle.

pub mod actor_system;
pub(crate) mod cell;
pub mod config;
pub mod dead_letter;
pub(crate) mod requests;
pub mod transport;

mod errors;

pub use actor_system::{
    ActorFactory, ActorSystem, HandlerId, MessageHandler, SystemMetricsSnapshot,
};
pub use config::{DispatcherKind, SystemConfig, SystemConfigBuilder};
pub use dead_letter::{DeadLetter, DeadLetterReason, DeadLetterSink};
pub use errors::SystemError;
pub use transport::TransportAdapter;
