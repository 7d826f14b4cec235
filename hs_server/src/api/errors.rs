//! Mapping of domain errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hydraulisc::AuthError;
use serde::Serialize;

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error
#[derive(Debug)]
pub enum ApiError {
    /// Failure reported by the identity layer
    Auth(AuthError),
    /// Resource absent where the identity layer has no error for it
    NotFound(&'static str),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(err) => status_for(err),
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::Auth(err) => err.client_message(),
            ApiError::NotFound(what) => format!("{what} not found"),
        }
    }
}

/// HTTP status for each error kind
pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidInvite
        | AuthError::InvalidInviteCount { .. }
        | AuthError::WeakCredential(_)
        | AuthError::InvalidDisplayName(_)
        | AuthError::MalformedIdentity
        | AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AuthError::UserNotFound
        | AuthError::BadCredential
        | AuthError::Unauthenticated
        | AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
        AuthError::AdmissionDenied | AuthError::Forbidden => StatusCode::FORBIDDEN,
        AuthError::PostNotFound => StatusCode::NOT_FOUND,
        AuthError::IdentityExhausted | AuthError::DuplicateIdentity => StatusCode::CONFLICT,
        AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        AuthError::StoreTimeout => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::Database(_) | AuthError::HashingFailed | AuthError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}
