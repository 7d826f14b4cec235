//! Authentication API handlers.
//!
//! Register, login and logout exchange the `hs_session` cookie; the session
//! itself stays on the server.
//!
//! # Examples
//!
//! Register with an invite:
//! ```bash
//! curl -X POST http://localhost:3000/api/v1/auth/register \
//!   -H "Content-Type: application/json" \
//!   -d '{"display_name": "Ami", "password": "longpassword1", "invite_code": "9f2c..."}'
//! ```
//!
//! Login:
//! ```bash
//! curl -X POST http://localhost:3000/api/v1/auth/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"identity": "Ami#0001", "password": "longpassword1"}'
//! ```

use axum::{
    Json,
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use hydraulisc::{
    Account, AuthError, Session,
    auth::{LoginRequest, RegisterRequest},
};
use serde::{Deserialize, Serialize};

use super::{
    AppState,
    errors::ApiError,
    middleware::{ClientKey, clear_session_cookie, session_cookie, session_token},
};
use crate::{logging::log_security_event, metrics};

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub display_name: String,
    pub password: String,
    #[serde(default)]
    pub invite_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    /// `Name#DDDD`
    pub identity: String,
    pub password: String,
}

/// Account summary returned after register and login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub account_id: i64,
    pub identity: String,
    pub display_name: String,
    pub discriminator: String,
    pub is_admin: bool,
    pub expires_at: DateTime<Utc>,
}

impl AuthResponse {
    fn new(account: &Account, session: &Session) -> Self {
        Self {
            account_id: account.id,
            identity: account.identity(),
            display_name: account.display_name.clone(),
            discriminator: account.discriminator.clone(),
            is_admin: account.is_admin,
            expires_at: session.expires_at,
        }
    }
}

/// The current session as seen by its owner
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub account_id: i64,
    pub identity: String,
    pub is_admin: bool,
    pub locale: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            account_id: session.account_id,
            identity: session.identity(),
            is_admin: session.is_admin,
            locale: session.locale,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

/// Register a new account and sign it in.
///
/// The admission mode is read once, at the start of the request.
///
/// # Response
///
/// `201 Created` with the new identity and a session cookie.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid display name, weak password, missing or spent invite
/// - `403 Forbidden`: Registration is closed
/// - `409 Conflict`: No free discriminator, or concurrent registrations kept colliding
/// - `429 Too Many Requests`: Rate limited
pub async fn register(
    State(state): State<AppState>,
    client: ClientKey,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = state.admission.mode();
    let request = RegisterRequest {
        display_name: payload.display_name,
        password: payload.password,
        invite_code: payload.invite_code,
    };

    let (account, session) = state
        .auth_manager
        .register(request, mode, client.as_str())
        .await
        .inspect_err(|err| match err {
            AuthError::AdmissionDenied | AuthError::InvalidInvite => {
                metrics::admission_denied_total(&mode.to_string());
                log_security_event(
                    "registration_refused",
                    None,
                    Some(client.as_str()),
                    &format!("{err} ({mode} mode)"),
                );
            }
            AuthError::RateLimited => metrics::rate_limit_hits_total("register"),
            _ => {}
        })?;

    metrics::registrations_total(&mode.to_string());
    tracing::info!(identity = %account.identity(), is_admin = account.is_admin, "Registered");

    let cookie = session_cookie(&session.token, state.auth_manager.session_ttl());
    let jar = CookieJar::new().add(cookie);
    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse::new(&account, &session)),
    ))
}

/// Login with a `Name#DDDD` identity and password.
///
/// # Errors
///
/// - `400 Bad Request`: Identity is not in `Name#DDDD` form
/// - `401 Unauthorized`: Invalid credentials (unknown identity and wrong
///   password are indistinguishable)
/// - `429 Too Many Requests`: Rate limited
pub async fn login(
    State(state): State<AppState>,
    client: ClientKey,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = payload.identity.clone();
    let request = LoginRequest {
        identity: payload.identity,
        password: payload.password,
    };

    let result = state.auth_manager.login(request, client.as_str()).await;
    metrics::login_attempts_total(result.is_ok());

    let (account, session) = result.inspect_err(|err| {
        if err.is_credential_failure() {
            log_security_event(
                "failed_login",
                None,
                Some(client.as_str()),
                &format!("Invalid credentials for {identity}"),
            );
        } else if matches!(err, AuthError::RateLimited) {
            metrics::rate_limit_hits_total("login");
            log_security_event("rate_limited", None, Some(client.as_str()), "Login rate limit hit");
        }
    })?;

    let cookie = session_cookie(&session.token, state.auth_manager.session_ttl());
    let jar = CookieJar::new().add(cookie);
    Ok((jar, Json(AuthResponse::new(&account, &session))))
}

/// End the current session and clear the cookie.
///
/// # Errors
///
/// - `401 Unauthorized`: No session cookie, or the session is already gone
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let token = session_token(&headers);
    let result = state.auth_manager.logout(token.as_deref()).await;

    // The cookie is stale either way
    let clear = CookieJar::new().add(clear_session_cookie());
    match result {
        Ok(()) => (StatusCode::NO_CONTENT, clear).into_response(),
        Err(err) => (clear, ApiError::Auth(err)).into_response(),
    }
}

/// The session behind the request cookie.
pub async fn current_session(Extension(session): Extension<Session>) -> Json<SessionResponse> {
    Json(SessionResponse::from(session))
}
