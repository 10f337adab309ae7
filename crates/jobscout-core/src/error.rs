//! Error types for jobscout.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Transient network/transport failure. Retried via message
    /// redelivery up to the dead-letter threshold.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Upstream 429 or analogous. The message is not acknowledged so
    /// the visibility timeout re-queues it.
    #[error("rate limited by upstream")]
    RateLimited,

    /// Well-formed response that doesn't match the expected shape.
    /// Not retryable.
    #[error("unexpected response shape: {0}")]
    Format(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether redelivering the triggering message can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::RateLimited)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::Unavailable("boom".into()).is_retryable());
        assert!(Error::RateLimited.is_retryable());
        assert!(!Error::Format("bad".into()).is_retryable());
        assert!(!Error::NotFound("gone".into()).is_retryable());
    }
}
