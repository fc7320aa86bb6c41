use std::time::Duration;

/// Failure kinds an item store may report. Stores classify backend errors into
/// this set once; callers only ever branch on the variant.
#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum DomainError {
    #[error("record not found")]
    NotFound,
    #[error("edit conflict")]
    EditConflict,
    #[error("invalid {field}: {message}")]
    Invalid { field: String, message: String },
    #[error("{operation} timed out after {} ms", .timeout.as_millis())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Only a timed-out call may succeed if the client simply repeats it.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
