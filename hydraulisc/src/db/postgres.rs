//! PostgreSQL repository implementations.
//!
//! Every query runs under [`with_default_timeout`]. Uniqueness is enforced by
//! the schema; violations surface as [`AuthError::DuplicateIdentity`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::repository::{AccountRepository, InviteRepository, PostRepository, SessionRepository};
use super::timeouts::{
    DEFAULT_TRANSACTION_TIMEOUT, TimeoutError, with_default_timeout, with_timeout,
};
use crate::auth::models::{NewAccount, ProfileUpdate};
use crate::auth::{Account, AccountId, AuthError, AuthResult, Session};
use crate::content::models::{Post, PostId};
use crate::invites::InviteCode;

const ACCOUNT_COLUMNS: &str = "id, display_name, discriminator, is_admin, avatar, banner, \
                               biography, theme, locale, created_at";

const SESSION_COLUMNS: &str = "token, account_id, display_name, discriminator, is_admin, \
                               locale, created_at, expires_at";

const POST_COLUMNS: &str = "id, account_id, title, filename, created_at";

fn account_from_row(r: &PgRow) -> Account {
    Account {
        id: r.get("id"),
        display_name: r.get("display_name"),
        discriminator: r.get("discriminator"),
        is_admin: r.get("is_admin"),
        avatar: r.get("avatar"),
        banner: r.get("banner"),
        biography: r.get("biography"),
        theme: r.get("theme"),
        locale: r.get("locale"),
        created_at: r.get("created_at"),
    }
}

fn session_from_row(r: &PgRow) -> Session {
    Session {
        token: r.get("token"),
        account_id: r.get("account_id"),
        display_name: r.get("display_name"),
        discriminator: r.get("discriminator"),
        is_admin: r.get("is_admin"),
        locale: r.get("locale"),
        created_at: r.get("created_at"),
        expires_at: r.get("expires_at"),
    }
}

fn invite_from_row(r: &PgRow) -> InviteCode {
    InviteCode {
        code: r.get("code"),
        used: r.get("used"),
        created_at: r.get("created_at"),
        used_at: r.get("used_at"),
    }
}

fn post_from_row(r: &PgRow) -> Post {
    Post {
        id: r.get("id"),
        account_id: r.get("account_id"),
        title: r.get("title"),
        filename: r.get("filename"),
        created_at: r.get("created_at"),
    }
}

/// Map unique-constraint violations on insert to `DuplicateIdentity`
fn map_insert_error(err: TimeoutError) -> AuthError {
    let duplicate = matches!(
        &err,
        TimeoutError::Database(sqlx::Error::Database(db_err)) if db_err.is_unique_violation()
    );

    if duplicate {
        AuthError::DuplicateIdentity
    } else {
        err.into()
    }
}

/// Default PostgreSQL implementation of `AccountRepository`
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn create(&self, account: NewAccount, is_admin: bool) -> AuthResult<Account> {
        let sql = format!(
            "INSERT INTO accounts (display_name, discriminator, password_hash, is_admin,
                                   avatar, banner, biography, theme, locale)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(&account.display_name)
                .bind(&account.discriminator)
                .bind(&account.password_hash)
                .bind(is_admin)
                .bind(&account.profile.avatar)
                .bind(&account.profile.banner)
                .bind(&account.profile.biography)
                .bind(&account.profile.theme)
                .bind(&account.profile.locale)
                .fetch_one(&self.pool),
        )
        .await
        .map_err(map_insert_error)?;

        Ok(account_from_row(&row))
    }

    async fn create_bootstrapping(&self, account: NewAccount) -> AuthResult<Account> {
        // Emptiness check and insert are one statement; the partial unique
        // index on is_bootstrap rejects a second concurrent winner.
        let sql = format!(
            "WITH first AS (SELECT NOT EXISTS (SELECT 1 FROM accounts) AS is_first)
             INSERT INTO accounts (display_name, discriminator, password_hash, is_admin,
                                   is_bootstrap, avatar, banner, biography, theme, locale)
             SELECT $1, $2, $3, first.is_first, first.is_first, $4, $5, $6, $7, $8
             FROM first
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(&account.display_name)
                .bind(&account.discriminator)
                .bind(&account.password_hash)
                .bind(&account.profile.avatar)
                .bind(&account.profile.banner)
                .bind(&account.profile.biography)
                .bind(&account.profile.theme)
                .bind(&account.profile.locale)
                .fetch_one(&self.pool),
        )
        .await
        .map_err(map_insert_error)?;

        Ok(account_from_row(&row))
    }

    async fn find_by_identity(
        &self,
        display_name: &str,
        discriminator: &str,
    ) -> AuthResult<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE display_name = $1 AND discriminator = $2"
        );

        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(display_name)
                .bind(discriminator)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn find_credentials(
        &self,
        display_name: &str,
        discriminator: &str,
    ) -> AuthResult<Option<(Account, String)>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS}, password_hash
             FROM accounts WHERE display_name = $1 AND discriminator = $2"
        );

        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(display_name)
                .bind(discriminator)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(|r| (account_from_row(&r), r.get("password_hash"))))
    }

    async fn find_by_id(&self, id: AccountId) -> AuthResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");

        let row =
            with_default_timeout(sqlx::query(&sql).bind(id).fetch_optional(&self.pool)).await?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn count_all(&self) -> AuthResult<i64> {
        let row = with_default_timeout(
            sqlx::query("SELECT COUNT(*) AS count FROM accounts").fetch_one(&self.pool),
        )
        .await?;

        Ok(row.get("count"))
    }

    async fn update_profile(&self, id: AccountId, update: &ProfileUpdate) -> AuthResult<()> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE accounts SET
                    avatar    = COALESCE($2, avatar),
                    banner    = COALESCE($3, banner),
                    biography = COALESCE($4, biography),
                    theme     = COALESCE($5, theme),
                    locale    = COALESCE($6, locale)
                 WHERE id = $1",
            )
            .bind(id)
            .bind(update.avatar.as_deref())
            .bind(update.banner.as_deref())
            .bind(update.biography.as_deref())
            .bind(update.theme.as_deref())
            .bind(update.locale.as_deref())
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    async fn discriminators_for(&self, display_name: &str) -> AuthResult<Vec<String>> {
        let rows = with_default_timeout(
            sqlx::query("SELECT discriminator FROM accounts WHERE display_name = $1")
                .bind(display_name)
                .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.iter().map(|r| r.get("discriminator")).collect())
    }

    async fn list_all(&self) -> AuthResult<Vec<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id");

        let rows = with_default_timeout(sqlx::query(&sql).fetch_all(&self.pool)).await?;

        Ok(rows.iter().map(account_from_row).collect())
    }
}

/// Default PostgreSQL implementation of `InviteRepository`
pub struct PgInviteRepository {
    pool: PgPool,
}

impl PgInviteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InviteRepository for PgInviteRepository {
    async fn insert_batch(&self, codes: &[String]) -> AuthResult<Vec<InviteCode>> {
        let pool = &self.pool;
        let insert_all = async move {
            let mut tx = pool.begin().await?;
            let mut inserted = Vec::with_capacity(codes.len());

            for code in codes {
                let row = sqlx::query(
                    "INSERT INTO invites (code) VALUES ($1)
                     RETURNING code, used, created_at, used_at",
                )
                .bind(code)
                .fetch_one(&mut *tx)
                .await?;
                inserted.push(invite_from_row(&row));
            }

            tx.commit().await?;
            Ok::<_, sqlx::Error>(inserted)
        };

        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, insert_all)
            .await
            .map_err(|err| match map_insert_error(err) {
                // A 128-bit collision; the batch rolled back as a whole
                AuthError::DuplicateIdentity => {
                    AuthError::Internal("invite code collision".to_string())
                }
                other => other,
            })
    }

    async fn consume(&self, code: &str) -> AuthResult<bool> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE invites SET used = TRUE, used_at = NOW() WHERE code = $1 AND used = FALSE",
            )
            .bind(code)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find(&self, code: &str) -> AuthResult<Option<InviteCode>> {
        let row = with_default_timeout(
            sqlx::query("SELECT code, used, created_at, used_at FROM invites WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(invite_from_row))
    }
}

/// Default PostgreSQL implementation of `SessionRepository`
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn insert(&self, session: &Session) -> AuthResult<()> {
        let sql = format!(
            "INSERT INTO sessions ({SESSION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        );

        with_default_timeout(
            sqlx::query(&sql)
                .bind(&session.token)
                .bind(session.account_id)
                .bind(&session.display_name)
                .bind(&session.discriminator)
                .bind(session.is_admin)
                .bind(&session.locale)
                .bind(session.created_at)
                .bind(session.expires_at)
                .execute(&self.pool),
        )
        .await
        .map_err(|err| match map_insert_error(err) {
            AuthError::DuplicateIdentity => AuthError::Internal("session token collision".into()),
            other => other,
        })?;

        Ok(())
    }

    async fn find(&self, token: &str) -> AuthResult<Option<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token = $1");

        let row =
            with_default_timeout(sqlx::query(&sql).bind(token).fetch_optional(&self.pool)).await?;

        Ok(row.as_ref().map(session_from_row))
    }

    async fn replace(&self, session: &Session) -> AuthResult<bool> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE sessions SET
                    account_id = $2, display_name = $3, discriminator = $4,
                    is_admin = $5, locale = $6, created_at = $7, expires_at = $8
                 WHERE token = $1",
            )
            .bind(&session.token)
            .bind(session.account_id)
            .bind(&session.display_name)
            .bind(&session.discriminator)
            .bind(session.is_admin)
            .bind(&session.locale)
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, token: &str) -> AuthResult<bool> {
        let result = with_default_timeout(
            sqlx::query("DELETE FROM sessions WHERE token = $1")
                .bind(token)
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let result = with_default_timeout(
            sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
                .bind(now)
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected())
    }
}

/// Default PostgreSQL implementation of `PostRepository`
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn create(&self, account_id: AccountId, title: &str, filename: &str) -> AuthResult<Post> {
        let sql = format!(
            "INSERT INTO posts (account_id, title, filename) VALUES ($1, $2, $3)
             RETURNING {POST_COLUMNS}"
        );

        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(account_id)
                .bind(title)
                .bind(filename)
                .fetch_one(&self.pool),
        )
        .await?;

        Ok(post_from_row(&row))
    }

    async fn find_by_id(&self, id: PostId) -> AuthResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");

        let row =
            with_default_timeout(sqlx::query(&sql).bind(id).fetch_optional(&self.pool)).await?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn list_by_account(&self, account_id: AccountId) -> AuthResult<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE account_id = $1
             ORDER BY created_at DESC, id DESC"
        );

        let rows =
            with_default_timeout(sqlx::query(&sql).bind(account_id).fetch_all(&self.pool)).await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn delete(&self, id: PostId) -> AuthResult<Option<Post>> {
        let sql = format!("DELETE FROM posts WHERE id = $1 RETURNING {POST_COLUMNS}");

        let row =
            with_default_timeout(sqlx::query(&sql).bind(id).fetch_optional(&self.pool)).await?;

        Ok(row.as_ref().map(post_from_row))
    }
}
