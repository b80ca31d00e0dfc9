//! Boundary to the external classification service.
//!
//! The core only talks to the service through [`ClassificationService`].
//! [`ClassifyClient`] implements it for the OCLC Classify protocol.

mod oclc;
mod types;

pub use oclc::{ClassifyClient, ClassifyConfig};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when querying the classification service.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request did not complete within the timeout.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Service rejected the request because of its rate limit.
    #[error("Rate limit exceeded, please wait before retrying")]
    RateLimitExceeded,

    /// Service returned a server-side error (5xx or unexpected error code).
    #[error("Service error: {status} - {message}")]
    ServiceError { status: u16, message: String },

    /// Request was rejected as malformed, unauthorized or otherwise invalid.
    #[error("Request rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// Service reported the query input as invalid.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Client not configured.
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

impl ClassifyError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClassifyError::HttpError(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            ClassifyError::Timeout(_)
            | ClassifyError::RateLimitExceeded
            | ClassifyError::ServiceError { .. } => true,
            ClassifyError::Rejected { .. }
            | ClassifyError::InvalidInput(_)
            | ClassifyError::ParseError(_)
            | ClassifyError::NotConfigured(_) => false,
        }
    }

    /// Classify an HTTP status code that is not a success.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => ClassifyError::RateLimitExceeded,
            408 | 500..=599 => ClassifyError::ServiceError { status, message },
            _ => ClassifyError::Rejected { status, message },
        }
    }
}

/// Trait for classification service clients.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// Name of this service for logging and metrics.
    fn name(&self) -> &str;

    /// Run one query and return the candidates found.
    ///
    /// An empty list means the service has no match for the query.
    async fn query(&self, query: &LookupQuery) -> Result<Vec<Candidate>, ClassifyError>;

    /// Check that the service is reachable and accepts our requests.
    async fn probe(&self) -> Result<(), ClassifyError> {
        Ok(())
    }
}
