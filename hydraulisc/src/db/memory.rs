//! In-memory repository implementations.
//!
//! Used by tests and by the server's development mode. Each table sits
//! behind its own async mutex; every trait method holds the lock for its
//! whole read-decide-write sequence, which gives the same atomicity the
//! PostgreSQL statements provide.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::repository::{AccountRepository, InviteRepository, PostRepository, SessionRepository};
use crate::auth::models::{NewAccount, ProfileUpdate};
use crate::auth::{Account, AccountId, AuthError, AuthResult, Session};
use crate::content::models::{Post, PostId};
use crate::invites::InviteCode;

struct StoredAccount {
    account: Account,
    password_hash: String,
}

#[derive(Default)]
struct AccountTable {
    rows: BTreeMap<AccountId, StoredAccount>,
    next_id: AccountId,
}

impl AccountTable {
    fn insert(&mut self, new: NewAccount, is_admin: bool) -> AuthResult<Account> {
        let taken = self.rows.values().any(|row| {
            row.account.display_name == new.display_name
                && row.account.discriminator == new.discriminator
        });
        if taken {
            return Err(AuthError::DuplicateIdentity);
        }

        self.next_id += 1;
        let account = Account {
            id: self.next_id,
            display_name: new.display_name,
            discriminator: new.discriminator,
            is_admin,
            avatar: new.profile.avatar,
            banner: new.profile.banner,
            biography: new.profile.biography,
            theme: new.profile.theme,
            locale: new.profile.locale,
            created_at: Utc::now(),
        };

        self.rows.insert(
            account.id,
            StoredAccount {
                account: account.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(account)
    }

    fn find(&self, display_name: &str, discriminator: &str) -> Option<&StoredAccount> {
        self.rows.values().find(|row| {
            row.account.display_name == display_name && row.account.discriminator == discriminator
        })
    }
}

/// In-memory `AccountRepository`
#[derive(Default)]
pub struct MemoryAccountRepository {
    table: Mutex<AccountTable>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn create(&self, account: NewAccount, is_admin: bool) -> AuthResult<Account> {
        self.table.lock().await.insert(account, is_admin)
    }

    async fn create_bootstrapping(&self, account: NewAccount) -> AuthResult<Account> {
        let mut table = self.table.lock().await;
        let is_first = table.rows.is_empty();
        table.insert(account, is_first)
    }

    async fn find_by_identity(
        &self,
        display_name: &str,
        discriminator: &str,
    ) -> AuthResult<Option<Account>> {
        let table = self.table.lock().await;
        Ok(table
            .find(display_name, discriminator)
            .map(|row| row.account.clone()))
    }

    async fn find_credentials(
        &self,
        display_name: &str,
        discriminator: &str,
    ) -> AuthResult<Option<(Account, String)>> {
        let table = self.table.lock().await;
        Ok(table
            .find(display_name, discriminator)
            .map(|row| (row.account.clone(), row.password_hash.clone())))
    }

    async fn find_by_id(&self, id: AccountId) -> AuthResult<Option<Account>> {
        let table = self.table.lock().await;
        Ok(table.rows.get(&id).map(|row| row.account.clone()))
    }

    async fn count_all(&self) -> AuthResult<i64> {
        let table = self.table.lock().await;
        Ok(table.rows.len() as i64)
    }

    async fn update_profile(&self, id: AccountId, update: &ProfileUpdate) -> AuthResult<()> {
        let mut table = self.table.lock().await;
        let row = table.rows.get_mut(&id).ok_or(AuthError::UserNotFound)?;
        let account = &mut row.account;

        if let Some(avatar) = &update.avatar {
            account.avatar = avatar.clone();
        }
        if let Some(banner) = &update.banner {
            account.banner = banner.clone();
        }
        if let Some(biography) = &update.biography {
            account.biography = biography.clone();
        }
        if let Some(theme) = &update.theme {
            account.theme = theme.clone();
        }
        if let Some(locale) = &update.locale {
            account.locale = locale.clone();
        }
        Ok(())
    }

    async fn discriminators_for(&self, display_name: &str) -> AuthResult<Vec<String>> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .filter(|row| row.account.display_name == display_name)
            .map(|row| row.account.discriminator.clone())
            .collect())
    }

    async fn list_all(&self) -> AuthResult<Vec<Account>> {
        let table = self.table.lock().await;
        Ok(table.rows.values().map(|row| row.account.clone()).collect())
    }
}

/// In-memory `InviteRepository`
#[derive(Default)]
pub struct MemoryInviteRepository {
    invites: Mutex<HashMap<String, InviteCode>>,
}

impl MemoryInviteRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InviteRepository for MemoryInviteRepository {
    async fn insert_batch(&self, codes: &[String]) -> AuthResult<Vec<InviteCode>> {
        let mut invites = self.invites.lock().await;

        // All or nothing, like the transactional insert
        if codes.iter().any(|code| invites.contains_key(code)) {
            return Err(AuthError::Internal("invite code collision".to_string()));
        }

        let now = Utc::now();
        let inserted: Vec<InviteCode> = codes
            .iter()
            .map(|code| InviteCode {
                code: code.clone(),
                used: false,
                created_at: now,
                used_at: None,
            })
            .collect();

        for invite in &inserted {
            invites.insert(invite.code.clone(), invite.clone());
        }
        Ok(inserted)
    }

    async fn consume(&self, code: &str) -> AuthResult<bool> {
        let mut invites = self.invites.lock().await;
        match invites.get_mut(code) {
            Some(invite) if !invite.used => {
                invite.used = true;
                invite.used_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find(&self, code: &str) -> AuthResult<Option<InviteCode>> {
        Ok(self.invites.lock().await.get(code).cloned())
    }
}

/// In-memory `SessionRepository`
#[derive(Default)]
pub struct MemorySessionRepository {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn insert(&self, session: &Session) -> AuthResult<()> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.token) {
            return Err(AuthError::Internal("session token collision".to_string()));
        }
        sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn find(&self, token: &str) -> AuthResult<Option<Session>> {
        Ok(self.sessions.lock().await.get(token).cloned())
    }

    async fn replace(&self, session: &Session) -> AuthResult<bool> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&session.token) {
            Some(stored) => {
                *stored = session.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, token: &str) -> AuthResult<bool> {
        Ok(self.sessions.lock().await.remove(token).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[derive(Default)]
struct PostTable {
    rows: BTreeMap<PostId, Post>,
    next_id: PostId,
}

/// In-memory `PostRepository`
#[derive(Default)]
pub struct MemoryPostRepository {
    table: Mutex<PostTable>,
}

impl MemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn create(&self, account_id: AccountId, title: &str, filename: &str) -> AuthResult<Post> {
        let mut table = self.table.lock().await;
        table.next_id += 1;

        let post = Post {
            id: table.next_id,
            account_id,
            title: title.to_string(),
            filename: filename.to_string(),
            created_at: Utc::now(),
        };
        table.rows.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, id: PostId) -> AuthResult<Option<Post>> {
        Ok(self.table.lock().await.rows.get(&id).cloned())
    }

    async fn list_by_account(&self, account_id: AccountId) -> AuthResult<Vec<Post>> {
        let table = self.table.lock().await;
        // IDs are monotonic, so reverse ID order is newest first
        Ok(table
            .rows
            .values()
            .rev()
            .filter(|post| post.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: PostId) -> AuthResult<Option<Post>> {
        Ok(self.table.lock().await.rows.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::ProfileDefaults;
    use chrono::Duration;
    use std::sync::Arc;

    fn new_account(name: &str, discriminator: &str) -> NewAccount {
        NewAccount {
            display_name: name.to_string(),
            discriminator: discriminator.to_string(),
            password_hash: "hash".to_string(),
            profile: ProfileDefaults::default(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_identity_is_rejected() {
        let repo = MemoryAccountRepository::new();
        repo.create(new_account("Ami", "0001"), false).await.unwrap();

        let err = repo.create(new_account("Ami", "0001"), false).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateIdentity));

        // Same name, other discriminator is fine
        assert!(repo.create(new_account("Ami", "0002"), false).await.is_ok());
        assert_eq!(repo.count_all().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bootstrapping_grants_admin_only_to_first_row() {
        let repo = MemoryAccountRepository::new();

        let first = repo.create_bootstrapping(new_account("Ami", "0001")).await.unwrap();
        let second = repo.create_bootstrapping(new_account("Bo", "0001")).await.unwrap();

        assert!(first.is_admin);
        assert!(!second.is_admin);
    }

    #[tokio::test]
    async fn test_concurrent_bootstrapping_yields_one_admin() {
        let repo = Arc::new(MemoryAccountRepository::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.create_bootstrapping(new_account(&format!("user{i}"), "0001"))
                    .await
                    .unwrap()
            }));
        }

        let mut admins = 0;
        for handle in handles {
            if handle.await.unwrap().is_admin {
                admins += 1;
            }
        }
        assert_eq!(admins, 1);
    }

    #[tokio::test]
    async fn test_credentials_and_profile_update() {
        let repo = MemoryAccountRepository::new();
        let account = repo.create(new_account("Ami", "0001"), false).await.unwrap();

        let (found, hash) = repo.find_credentials("Ami", "0001").await.unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert_eq!(hash, "hash");

        let update = ProfileUpdate {
            theme: Some("dark".to_string()),
            ..Default::default()
        };
        repo.update_profile(account.id, &update).await.unwrap();
        let updated = repo.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(updated.theme, "dark");
        assert_eq!(updated.locale, "en");

        assert!(matches!(
            repo.update_profile(999, &update).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_invite_consumed_once() {
        let repo = MemoryInviteRepository::new();
        repo.insert_batch(&["abc".to_string()]).await.unwrap();

        assert!(repo.consume("abc").await.unwrap());
        assert!(!repo.consume("abc").await.unwrap());
        assert!(!repo.consume("missing").await.unwrap());

        let invite = repo.find("abc").await.unwrap().unwrap();
        assert!(invite.used);
        assert!(invite.used_at.is_some());
    }

    #[tokio::test]
    async fn test_invite_batch_is_all_or_nothing() {
        let repo = MemoryInviteRepository::new();
        repo.insert_batch(&["abc".to_string()]).await.unwrap();

        let result = repo
            .insert_batch(&["def".to_string(), "abc".to_string()])
            .await;
        assert!(result.is_err());
        assert!(repo.find("def").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_replace_and_expiry_sweep() {
        let repo = MemorySessionRepository::new();
        let now = Utc::now();
        let session = Session {
            token: "tok".to_string(),
            account_id: 1,
            display_name: "Ami".to_string(),
            discriminator: "0001".to_string(),
            is_admin: false,
            locale: "en".to_string(),
            created_at: now,
            expires_at: now + Duration::minutes(1),
        };

        repo.insert(&session).await.unwrap();
        assert!(repo.insert(&session).await.is_err());

        let refreshed = session.refreshed(now, Duration::hours(1));
        assert!(repo.replace(&refreshed).await.unwrap());
        assert_eq!(repo.find("tok").await.unwrap().unwrap(), refreshed);

        assert_eq!(repo.delete_expired(now + Duration::minutes(30)).await.unwrap(), 0);
        assert_eq!(repo.delete_expired(now + Duration::hours(2)).await.unwrap(), 1);
        assert!(!repo.replace(&refreshed).await.unwrap());
        assert!(!repo.delete("tok").await.unwrap());
    }

    #[tokio::test]
    async fn test_posts_listed_newest_first() {
        let repo = MemoryPostRepository::new();
        let first = repo.create(1, "first", "a.png").await.unwrap();
        let second = repo.create(1, "second", "b.png").await.unwrap();
        repo.create(2, "other", "c.png").await.unwrap();

        let ids: Vec<PostId> = repo
            .list_by_account(1)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);

        assert_eq!(repo.delete(first.id).await.unwrap(), Some(first));
        assert_eq!(repo.delete(1).await.unwrap(), None);
    }
}
