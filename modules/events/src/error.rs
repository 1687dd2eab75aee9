// Events module errors

use thiserror::Error;

/// Errors raised by an [`crate::EventPublisher`] binding.
///
/// Transient failures may be retried by the caller; fatal failures must be
/// escalated (misconfiguration, serialization, broker rejection).
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("transient publish failure: {0}")]
    Transient(String),

    #[error("fatal publish failure: {0}")]
    Fatal(String),
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Transient(_))
    }
}

/// Errors raised by a [`crate::ProcessedEventStore`] binding.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("processed-event store failure: {0}")]
    Backend(String),
}
