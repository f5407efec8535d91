//! Mailbox error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use super::backpressure::BackpressureError;

/// Errors surfaced by mailbox operations.
#[derive(Error, Debug)]
pub enum MailboxError {
    /// The mailbox has been closed (actor stopped)
    #[error("mailbox closed")]
    Closed,

    /// Admission control rejected or failed the submit
    #[error(transparent)]
    Backpressure(#[from] BackpressureError),
}
