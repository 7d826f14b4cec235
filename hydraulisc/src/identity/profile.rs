//! Profile customisation.

use std::sync::Arc;

use crate::auth::{Account, AccountId, AuthError, AuthResult, Session, models::ProfileUpdate};
use crate::db::AccountRepository;

/// Maximum biography length in characters
pub const MAX_BIOGRAPHY_LEN: usize = 2000;

/// Maximum theme / locale length in characters
pub const MAX_SHORT_FIELD_LEN: usize = 32;

/// Maximum stored avatar / banner path length
pub const MAX_PATH_LEN: usize = 512;

/// Updates profile fields on behalf of the owner or an administrator
#[derive(Clone)]
pub struct ProfileManager {
    accounts: Arc<dyn AccountRepository>,
}

impl ProfileManager {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    /// Look up an account by ID
    pub async fn get(&self, account_id: AccountId) -> AuthResult<Account> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Apply a profile update
    ///
    /// # Errors
    ///
    /// * `AuthError::Unauthenticated` - no session
    /// * `AuthError::Forbidden` - session is neither the owner nor an administrator
    /// * `AuthError::InvalidInput` - a field is out of bounds
    /// * `AuthError::UserNotFound` - no such account
    pub async fn update_profile(
        &self,
        session: Option<&Session>,
        account_id: AccountId,
        update: ProfileUpdate,
    ) -> AuthResult<Account> {
        let session = session.ok_or(AuthError::Unauthenticated)?;
        if session.account_id != account_id && !session.is_admin {
            return Err(AuthError::Forbidden);
        }

        validate_update(&update)?;

        if !update.is_empty() {
            self.accounts.update_profile(account_id, &update).await?;
            log::info!(
                "Profile of account {} updated by account {}",
                account_id,
                session.account_id
            );
        }

        self.get(account_id).await
    }
}

fn validate_update(update: &ProfileUpdate) -> AuthResult<()> {
    check_len("avatar", update.avatar.as_deref(), 1, MAX_PATH_LEN)?;
    check_len("banner", update.banner.as_deref(), 1, MAX_PATH_LEN)?;
    check_len("biography", update.biography.as_deref(), 0, MAX_BIOGRAPHY_LEN)?;
    check_len("theme", update.theme.as_deref(), 1, MAX_SHORT_FIELD_LEN)?;
    check_len("locale", update.locale.as_deref(), 1, MAX_SHORT_FIELD_LEN)?;
    Ok(())
}

fn check_len(field: &str, value: Option<&str>, min: usize, max: usize) -> AuthResult<()> {
    let Some(value) = value else {
        return Ok(());
    };

    let len = value.chars().count();
    if len < min || len > max {
        return Err(AuthError::InvalidInput(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_update_bounds() {
        let ok = ProfileUpdate {
            biography: Some(String::new()),
            theme: Some("dark".to_string()),
            ..Default::default()
        };
        assert!(validate_update(&ok).is_ok());

        let long_bio = ProfileUpdate {
            biography: Some("b".repeat(MAX_BIOGRAPHY_LEN + 1)),
            ..Default::default()
        };
        assert!(matches!(
            validate_update(&long_bio),
            Err(AuthError::InvalidInput(_))
        ));

        let empty_theme = ProfileUpdate {
            theme: Some(String::new()),
            ..Default::default()
        };
        assert!(validate_update(&empty_theme).is_err());
    }
}
