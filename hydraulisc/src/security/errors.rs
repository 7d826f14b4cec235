//! Error types for security module

use thiserror::Error;

/// Result type for rate limiting operations
pub type RateLimiterResult<T> = Result<T, RateLimitError>;

/// Rate limiting errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Rate limit exceeded
    #[error("Rate limit exceeded for {endpoint}: retry after {retry_after}s")]
    Exceeded { endpoint: String, retry_after: u64 },

    /// Invalid endpoint configuration
    #[error("Invalid endpoint configuration: {0}")]
    InvalidEndpoint(String),
}
