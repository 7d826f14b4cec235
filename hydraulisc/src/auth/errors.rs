//! Authentication and admission error types.

use thiserror::Error;

use crate::db::timeouts::TimeoutError;
use crate::security::RateLimitError;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A store operation did not finish in time
    #[error("Store operation timed out")]
    StoreTimeout,

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// The configured admission mode forbids registration
    #[error("Registration is currently disabled")]
    AdmissionDenied,

    /// Invite code missing, unknown or already used
    #[error("Invalid or used invite code")]
    InvalidInvite,

    /// Invite batch size outside the accepted range
    #[error("Invite count must be between 1 and {max}, got {requested}")]
    InvalidInviteCount { requested: usize, max: usize },

    /// Every discriminator is taken for this display name
    #[error("No free discriminator left for this display name")]
    IdentityExhausted,

    /// Another registration committed the same identity first
    #[error("Identity already taken, please retry")]
    DuplicateIdentity,

    /// Password rejected by the strength rules
    #[error("Password too weak: {0}")]
    WeakCredential(String),

    /// Display name rejected by the charset or length rules
    #[error("Invalid display name: {0}")]
    InvalidDisplayName(String),

    /// Login identity is not in `Name#DDDD` form
    #[error("Identity must look like Name#0001")]
    MalformedIdentity,

    /// User not found
    #[error("User not found")]
    UserNotFound,

    /// Password verification failed
    #[error("Invalid password")]
    BadCredential,

    /// No session, or the session is unknown
    #[error("Not authenticated")]
    Unauthenticated,

    /// Session expired
    #[error("Session expired")]
    SessionExpired,

    /// Authenticated but lacking privilege or ownership
    #[error("Forbidden")]
    Forbidden,

    /// Rate limited
    #[error("Too many attempts, please try again later")]
    RateLimited,

    /// Post not found
    #[error("Post not found")]
    PostNotFound,

    /// Field rejected by input validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invariant broken somewhere below the API
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Unknown identities and wrong passwords share one message so callers
    /// cannot probe which identities exist. Storage failures are reduced to a
    /// generic message.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::UserNotFound | AuthError::BadCredential => {
                "Invalid credentials".to_string()
            }
            AuthError::Database(_)
            | AuthError::StoreTimeout
            | AuthError::HashingFailed
            | AuthError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether repeating the whole request may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, AuthError::DuplicateIdentity)
    }

    /// Whether the error is a credential failure that must look uniform
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, AuthError::UserNotFound | AuthError::BadCredential)
    }
}

impl From<TimeoutError> for AuthError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(_) => AuthError::StoreTimeout,
            TimeoutError::Database(e) => AuthError::Database(e),
        }
    }
}

impl From<RateLimitError> for AuthError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Exceeded { .. } => AuthError::RateLimited,
            RateLimitError::InvalidEndpoint(endpoint) => {
                AuthError::Internal(format!("no rate limit configured for {endpoint}"))
            }
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
