//! Post lifecycle for their owners.

use std::sync::Arc;

use super::models::{NewPost, Post, PostId};
use crate::auth::{AccountId, AuthError, AuthResult, Session};
use crate::db::PostRepository;

/// Maximum post title length in characters
pub const MAX_TITLE_LEN: usize = 200;

/// Creates, lists and deletes posts
#[derive(Clone)]
pub struct PostManager {
    posts: Arc<dyn PostRepository>,
}

impl PostManager {
    pub fn new(posts: Arc<dyn PostRepository>) -> Self {
        Self { posts }
    }

    /// Create a post owned by the session's account
    pub async fn create_post(&self, session: Option<&Session>, post: NewPost) -> AuthResult<Post> {
        let session = session.ok_or(AuthError::Unauthenticated)?;

        let title = post.title.trim();
        let len = title.chars().count();
        if len == 0 || len > MAX_TITLE_LEN {
            return Err(AuthError::InvalidInput(format!(
                "title must be between 1 and {MAX_TITLE_LEN} characters"
            )));
        }

        let filename = post.filename.trim();
        if filename.is_empty() {
            return Err(AuthError::InvalidInput("filename must not be empty".to_string()));
        }

        self.posts.create(session.account_id, title, filename).await
    }

    pub async fn find_post(&self, id: PostId) -> AuthResult<Post> {
        self.posts.find_by_id(id).await?.ok_or(AuthError::PostNotFound)
    }

    /// Posts of one account, newest first
    pub async fn list_posts_by(&self, account_id: AccountId) -> AuthResult<Vec<Post>> {
        self.posts.list_by_account(account_id).await
    }

    /// Delete one of the session owner's posts
    ///
    /// Administrators removing someone else's post go through
    /// [`AdminAuthority::force_delete_post`](crate::admin::AdminAuthority::force_delete_post).
    pub async fn delete_post(&self, session: Option<&Session>, id: PostId) -> AuthResult<Post> {
        let session = session.ok_or(AuthError::Unauthenticated)?;

        let post = self.find_post(id).await?;
        if post.account_id != session.account_id {
            return Err(AuthError::Forbidden);
        }

        self.posts.delete(id).await?.ok_or(AuthError::PostNotFound)
    }
}
