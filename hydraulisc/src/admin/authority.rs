//! Admin gate and the operations behind it.

use std::sync::Arc;

use crate::auth::{Account, AuthError, AuthResult, Session};
use crate::content::models::{Post, PostId};
use crate::db::{AccountRepository, PostRepository, Stores};
use crate::invites::{InviteCode, InviteLedger};

/// Gatekeeper for privileged operations
#[derive(Clone)]
pub struct AdminAuthority {
    accounts: Arc<dyn AccountRepository>,
    posts: Arc<dyn PostRepository>,
    ledger: InviteLedger,
}

impl AdminAuthority {
    pub fn new(stores: &Stores) -> Self {
        Self {
            accounts: Arc::clone(&stores.accounts),
            posts: Arc::clone(&stores.posts),
            ledger: InviteLedger::new(Arc::clone(&stores.invites)),
        }
    }

    /// Whether the account table is still empty
    ///
    /// Informational only. Registration grants the bootstrap privilege
    /// inside the store's insert, not by calling this first.
    pub async fn is_first_ever_account(&self) -> AuthResult<bool> {
        Ok(self.accounts.count_all().await? == 0)
    }

    /// Require an administrator session
    ///
    /// # Errors
    ///
    /// * `AuthError::Unauthenticated` - no session
    /// * `AuthError::Forbidden` - session lacks the administrator flag
    pub fn require_admin<'a>(&self, session: Option<&'a Session>) -> AuthResult<&'a Session> {
        let session = session.ok_or(AuthError::Unauthenticated)?;
        if !session.is_admin {
            log::warn!(
                "Account {} attempted an administrator operation",
                session.account_id
            );
            return Err(AuthError::Forbidden);
        }
        Ok(session)
    }

    /// Mint a batch of invite codes
    pub async fn generate_invites(
        &self,
        session: Option<&Session>,
        count: usize,
    ) -> AuthResult<Vec<InviteCode>> {
        let admin = self.require_admin(session)?;
        let minted = self.ledger.generate(count).await?;

        log::info!(
            "Administrator {} minted {} invite codes",
            admin.identity(),
            minted.len()
        );
        Ok(minted)
    }

    /// Delete any post regardless of owner
    pub async fn force_delete_post(
        &self,
        session: Option<&Session>,
        post_id: PostId,
    ) -> AuthResult<Post> {
        let admin = self.require_admin(session)?;
        let post = self
            .posts
            .delete(post_id)
            .await?
            .ok_or(AuthError::PostNotFound)?;

        log::info!(
            "Administrator {} took down post {} of account {}",
            admin.identity(),
            post.id,
            post.account_id
        );
        Ok(post)
    }

    /// All accounts, for the admin panel
    pub async fn list_accounts(&self, session: Option<&Session>) -> AuthResult<Vec<Account>> {
        self.require_admin(session)?;
        self.accounts.list_all().await
    }
}
