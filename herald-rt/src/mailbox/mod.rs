//! Per-actor message queuing with prioritized lanes and backpressure control.

pub mod backpressure;
pub mod mailbox;
pub mod metrics;
pub mod traits;

pub use backpressure::{
    BackpressureConfig, BackpressureController, BackpressureError, BackpressureEvent,
    BackpressureObserver, BackpressureStrategy, DropKind, QueueKind, SubmitOutcome,
};
pub use mailbox::Mailbox;
pub use metrics::{AtomicMetrics, MetricsRecorder};
pub use traits::MailboxError;
