//! Administrator-only handlers.
//!
//! Every handler here runs behind the session middleware and checks the
//! administrator flag before looking at its input. Request bodies are read
//! as raw bytes and only parsed once the caller is known to be an
//! administrator.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, State},
};
use hydraulisc::{
    Account, AuthError, Session,
    content::Post,
    invites::MAX_INVITE_BATCH,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AppState, errors::ApiError};
use crate::{config::ServerConfig, logging::log_security_event, metrics};

#[derive(Debug, Deserialize)]
pub struct MintInvitesPayload {
    /// Number of codes to mint, a positive integer
    pub count: Value,
}

#[derive(Debug, Serialize)]
pub struct MintInvitesResponse {
    pub codes: Vec<String>,
    pub links: Vec<String>,
}

/// Reject non-administrators, counting and logging the attempt
fn require_admin<'a>(state: &AppState, session: &'a Session) -> Result<&'a Session, ApiError> {
    state.admin.require_admin(Some(session)).map_err(|err| {
        if matches!(err, AuthError::Forbidden) {
            metrics::admin_denials_total();
            log_security_event(
                "admin_denied",
                Some(session.account_id),
                None,
                &format!("{} attempted an administrator operation", session.identity()),
            );
        }
        ApiError::Auth(err)
    })
}

/// Accept a JSON integer, or a string holding one
fn parse_count(value: &Value) -> Result<usize, AuthError> {
    let invalid = || AuthError::InvalidInput("count must be a positive integer".to_string());

    let count = match value {
        Value::Number(n) => n.as_u64().ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    usize::try_from(count).map_err(|_| AuthError::InvalidInviteCount {
        requested: usize::MAX,
        max: MAX_INVITE_BATCH,
    })
}

/// Mint a batch of invite codes.
///
/// # Request Body
///
/// ```json
/// { "count": 5 }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "codes": ["9f2c...", "..."],
///   "links": ["https://blog.example/register/9f2c...", "..."]
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body, or `count` is not an integer in `1..=100`
/// - `403 Forbidden`: Caller is not an administrator, whatever the body
pub async fn mint_invites(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    body: Bytes,
) -> Result<Json<MintInvitesResponse>, ApiError> {
    let admin = require_admin(&state, &session)?;
    let payload: MintInvitesPayload = serde_json::from_slice(&body).map_err(|err| {
        AuthError::InvalidInput(format!("expected a JSON object with a count: {err}"))
    })?;
    let count = parse_count(&payload.count)?;

    let minted = state.admin.generate_invites(Some(admin), count).await?;
    metrics::invites_minted_total(minted.len());

    let codes: Vec<String> = minted.into_iter().map(|invite| invite.code).collect();
    let links = codes
        .iter()
        .map(|code| ServerConfig::invite_link(&state.public_url, code))
        .collect();

    Ok(Json(MintInvitesResponse { codes, links }))
}

/// List every account.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Account>>, ApiError> {
    let admin = require_admin(&state, &session)?;
    Ok(Json(state.admin.list_accounts(Some(admin)).await?))
}

/// Take down any post regardless of owner.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an administrator
/// - `404 Not Found`: No such post
pub async fn takedown_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(post_id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    let admin = require_admin(&state, &session)?;
    let post = state.admin.force_delete_post(Some(admin), post_id).await?;
    Ok(Json(post))
}
