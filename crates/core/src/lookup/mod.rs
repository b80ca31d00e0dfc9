//! Lookup client adapter.
//!
//! Wraps a [`ClassificationService`](crate::classify::ClassificationService)
//! with the shared request throttle, per-request timeouts, retry with
//! exponential backoff, work follow-ups and an in-run response cache.

mod client;
mod config;
mod rate_limiter;
mod retry;

pub use client::{LookupClient, LookupResponse};
pub use config::LookupConfig;
pub use rate_limiter::Throttle;
pub use retry::RetryPolicy;

use thiserror::Error;

use crate::classify::ClassifyError;

/// Errors surfaced by the lookup adapter.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The service rejected the request; retrying would not help.
    #[error("non-retryable lookup failure: {0}")]
    NonRetryable(ClassifyError),

    /// Every allowed attempt failed with a transient error.
    #[error("lookup failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: ClassifyError,
    },

    /// The batch was cancelled while the lookup was in flight.
    #[error("lookup cancelled")]
    Cancelled,
}

impl LookupError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LookupError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LookupError::RetriesExhausted {
            attempts: 3,
            last_error: ClassifyError::ServiceError {
                status: 503,
                message: "unavailable".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "lookup failed after 3 attempts: Service error: 503 - unavailable"
        );

        let err = LookupError::NonRetryable(ClassifyError::InvalidInput("bad isbn".into()));
        assert_eq!(
            err.to_string(),
            "non-retryable lookup failure: Invalid input: bad isbn"
        );
        assert!(LookupError::Cancelled.is_cancelled());
    }
}
