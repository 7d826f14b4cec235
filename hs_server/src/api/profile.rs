//! Profile handlers.

use axum::{
    Json,
    extract::{Extension, Path, State},
};
use hydraulisc::{
    Account, AccountId, AuthError, Session,
    auth::ProfileUpdate,
    content::Post,
};
use serde::Serialize;

use super::{AppState, errors::ApiError};

/// Public view of an account and its posts
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub identity: String,
    #[serde(flatten)]
    pub account: Account,
    pub posts: Vec<Post>,
}

/// Public profile page data.
///
/// # Errors
///
/// - `404 Not Found`: No such account
pub async fn get_profile(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let account = state.profiles.get(account_id).await.map_err(|err| match err {
        AuthError::UserNotFound => ApiError::NotFound("Account"),
        other => ApiError::Auth(other),
    })?;
    let posts = state.posts.list_posts_by(account_id).await?;

    Ok(Json(ProfileResponse {
        identity: account.identity(),
        account,
        posts,
    }))
}

/// Update profile fields; owner or administrator only.
///
/// # Errors
///
/// - `400 Bad Request`: A field is out of bounds
/// - `403 Forbidden`: Neither the owner nor an administrator
/// - `404 Not Found`: No such account
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(account_id): Path<AccountId>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Account>, ApiError> {
    let account = state
        .profiles
        .update_profile(Some(&session), account_id, update)
        .await
        .map_err(|err| match err {
            AuthError::UserNotFound => ApiError::NotFound("Account"),
            other => ApiError::Auth(other),
        })?;
    Ok(Json(account))
}
