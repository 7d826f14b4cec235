//! Post handlers.

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use hydraulisc::{
    Session,
    content::{NewPost, Post},
};

use super::{AppState, errors::ApiError};

/// Create a post owned by the caller.
///
/// # Errors
///
/// - `400 Bad Request`: Empty or overlong title, empty filename
pub async fn create_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<NewPost>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let post = state.posts.create_post(Some(&session), payload).await?;
    tracing::info!(post_id = post.id, account_id = session.account_id, "Post created");
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.posts.find_post(post_id).await?))
}

/// Delete one of the caller's own posts.
///
/// # Errors
///
/// - `403 Forbidden`: The post belongs to someone else, administrators included
/// - `404 Not Found`: No such post
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.posts.delete_post(Some(&session), post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
