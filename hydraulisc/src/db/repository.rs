//! Repository trait definitions for testability and dependency injection.
//!
//! Every component talks to storage through these traits. PostgreSQL
//! implementations live in [`super::postgres`], in-memory ones in
//! [`super::memory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::{Account, AccountId, AuthResult, Session};
use crate::auth::models::{NewAccount, ProfileUpdate};
use crate::content::models::{Post, PostId};
use crate::invites::InviteCode;

/// Persistent table of accounts
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert an account with an explicit privilege flag
    ///
    /// Fails with `AuthError::DuplicateIdentity` when the
    /// `(display_name, discriminator)` pair already exists.
    async fn create(&self, account: NewAccount, is_admin: bool) -> AuthResult<Account>;

    /// Insert an account, granting administrator privilege only if no
    /// account existed before it
    ///
    /// The emptiness check and the insert form one critical section: at most
    /// one account can ever be created with the bootstrap grant.
    async fn create_bootstrapping(&self, account: NewAccount) -> AuthResult<Account>;

    /// Find account by display name and discriminator
    async fn find_by_identity(
        &self,
        display_name: &str,
        discriminator: &str,
    ) -> AuthResult<Option<Account>>;

    /// Find account plus its stored credential hash
    async fn find_credentials(
        &self,
        display_name: &str,
        discriminator: &str,
    ) -> AuthResult<Option<(Account, String)>>;

    /// Find account by ID
    async fn find_by_id(&self, id: AccountId) -> AuthResult<Option<Account>>;

    /// Number of accounts ever stored
    async fn count_all(&self) -> AuthResult<i64>;

    /// Apply a profile update; fails with `AuthError::UserNotFound` for unknown IDs
    async fn update_profile(&self, id: AccountId, update: &ProfileUpdate) -> AuthResult<()>;

    /// Discriminators currently used with a display name
    async fn discriminators_for(&self, display_name: &str) -> AuthResult<Vec<String>>;

    /// All accounts ordered by ID
    async fn list_all(&self) -> AuthResult<Vec<Account>>;
}

/// Persistent table of invite codes
#[async_trait]
pub trait InviteRepository: Send + Sync {
    /// Store fresh codes, returned in the order given
    async fn insert_batch(&self, codes: &[String]) -> AuthResult<Vec<InviteCode>>;

    /// Atomically flip an unused code to used
    ///
    /// Returns `true` only for the single call that performed the flip.
    async fn consume(&self, code: &str) -> AuthResult<bool>;

    /// Find invite by code
    async fn find(&self, code: &str) -> AuthResult<Option<InviteCode>>;
}

/// Persistent table of sessions keyed by token
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a new session
    async fn insert(&self, session: &Session) -> AuthResult<()>;

    /// Find session by token
    async fn find(&self, token: &str) -> AuthResult<Option<Session>>;

    /// Replace the stored session with the same token
    ///
    /// Returns `false` if the session no longer exists.
    async fn replace(&self, session: &Session) -> AuthResult<bool>;

    /// Remove a session, returning whether it existed
    async fn delete(&self, token: &str) -> AuthResult<bool>;

    /// Remove every session that expired at or before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// Persistent table of posts
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a post
    async fn create(&self, account_id: AccountId, title: &str, filename: &str) -> AuthResult<Post>;

    /// Find post by ID
    async fn find_by_id(&self, id: PostId) -> AuthResult<Option<Post>>;

    /// Posts of one account, newest first
    async fn list_by_account(&self, account_id: AccountId) -> AuthResult<Vec<Post>>;

    /// Delete a post, returning the removed record
    async fn delete(&self, id: PostId) -> AuthResult<Option<Post>>;
}
