//! Authentication data models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Account ID type
pub type AccountId = i64;

/// A registered account
///
/// The credential hash is deliberately not part of this type; it only
/// travels between the store and the password verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub display_name: String,
    pub discriminator: String,
    pub is_admin: bool,
    pub avatar: String,
    pub banner: String,
    pub biography: String,
    pub theme: String,
    pub locale: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// The externally presented identity, e.g. `Ami#0001`
    pub fn identity(&self) -> String {
        format!("{}#{}", self.display_name, self.discriminator)
    }
}

/// Profile values every account starts with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDefaults {
    pub avatar: String,
    pub banner: String,
    pub biography: String,
    pub theme: String,
    pub locale: String,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            avatar: "/img/defaultpfp.webp".to_string(),
            banner: "/img/defaultbanner.webp".to_string(),
            biography: "User has not written their Bio.".to_string(),
            theme: "default".to_string(),
            locale: "en".to_string(),
        }
    }
}

/// Row to be inserted by the account store
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub display_name: String,
    pub discriminator: String,
    pub password_hash: String,
    pub profile: ProfileDefaults,
}

/// Partial profile update, `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub avatar: Option<String>,
    pub banner: Option<String>,
    pub biography: Option<String>,
    pub theme: Option<String>,
    pub locale: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.avatar.is_none()
            && self.banner.is_none()
            && self.biography.is_none()
            && self.theme.is_none()
            && self.locale.is_none()
    }
}

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    pub password: String,
    pub invite_code: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Combined identity in `Name#DDDD` form
    pub identity: String,
    pub password: String,
}

/// Server-side session record
///
/// Sessions are immutable values. A refresh produces a new `Session` that
/// replaces the stored one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub account_id: AccountId,
    pub display_name: String,
    pub discriminator: String,
    pub is_admin: bool,
    pub locale: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Build a fresh session for an account
    pub fn for_account(account: &Account, token: String, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token,
            account_id: account.id,
            display_name: account.display_name.clone(),
            discriminator: account.discriminator.clone(),
            is_admin: account.is_admin,
            locale: account.locale.clone(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Copy of this session with the expiry pushed out to `now + ttl`
    pub fn refreshed(&self, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            expires_at: now + ttl,
            ..self.clone()
        }
    }

    pub fn identity(&self) -> String {
        format!("{}#{}", self.display_name, self.discriminator)
    }
}
