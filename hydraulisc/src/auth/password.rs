//! Argon2id credential hashing.
//!
//! Hashing is CPU bound and deliberately slow, so every call is moved to the
//! blocking thread pool instead of running on a runtime worker.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::sync::OnceCell;

use super::errors::{AuthError, AuthResult};

/// Minimum password length in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum password length in characters
pub const MAX_PASSWORD_LEN: usize = 128;

/// Argon2id hasher with a server-side pepper
#[derive(Clone)]
pub struct CredentialHasher {
    pepper: Arc<str>,
    /// Hash verified against when a login names an unknown identity
    dummy_hash: Arc<OnceCell<String>>,
}

impl CredentialHasher {
    pub fn new(pepper: String) -> Self {
        Self {
            pepper: Arc::from(pepper),
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Hash password with Argon2id + pepper
    pub async fn hash(&self, password: &str) -> AuthResult<String> {
        let peppered = self.peppered(password);

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(peppered.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|_| AuthError::HashingFailed)
        })
        .await
        .map_err(|_| AuthError::HashingFailed)?
    }

    /// Verify password against hash
    pub async fn verify(&self, password: &str, hash: String) -> AuthResult<()> {
        let peppered = self.peppered(password);

        tokio::task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&hash).map_err(|_| AuthError::BadCredential)?;
            Argon2::default()
                .verify_password(peppered.as_bytes(), &parsed_hash)
                .map_err(|_| AuthError::BadCredential)
        })
        .await
        .map_err(|_| AuthError::HashingFailed)?
    }

    /// Burn one verification against a throwaway hash.
    ///
    /// Keeps the "unknown identity" path as slow as the "wrong password" path.
    /// The outcome is discarded.
    pub async fn verify_dummy(&self, password: &str) -> AuthResult<()> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash("hydraulisc-dummy-credential"))
            .await?
            .clone();

        let _ = self.verify(password, hash).await;
        Ok(())
    }

    fn peppered(&self, password: &str) -> String {
        format!("{}{}", password, self.pepper)
    }
}

/// Validate password strength
///
/// Length is counted in characters, control characters are rejected.
pub fn validate_password(password: &str) -> AuthResult<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakCredential(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if len > MAX_PASSWORD_LEN {
        return Err(AuthError::WeakCredential(format!(
            "Password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }

    if password.chars().any(char::is_control) {
        return Err(AuthError::WeakCredential(
            "Password must not contain control characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password_bounds() {
        assert!(validate_password("longpassword1").is_ok());
        assert!(validate_password("12345678").is_ok());
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakCredential(_))
        ));
        assert!(matches!(
            validate_password(&"x".repeat(MAX_PASSWORD_LEN + 1)),
            Err(AuthError::WeakCredential(_))
        ));
    }

    #[test]
    fn test_validate_password_counts_characters_not_bytes() {
        // 8 characters, 16 bytes
        assert!(validate_password("ßßßßßßßß").is_ok());
        // 4 characters, 8 bytes
        assert!(validate_password("ßßßß").is_err());
    }

    #[test]
    fn test_validate_password_rejects_control_characters() {
        assert!(validate_password("password\u{0}1").is_err());
        assert!(validate_password("pass\nword12").is_err());
        assert!(validate_password("pass word 12").is_ok());
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hasher = CredentialHasher::new("pepper_for_tests".to_string());
        let hash = hasher.hash("longpassword1").await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("longpassword1"));
        assert!(hasher.verify("longpassword1", hash.clone()).await.is_ok());
        assert!(matches!(
            hasher.verify("wrongpassword", hash).await,
            Err(AuthError::BadCredential)
        ));
    }

    #[tokio::test]
    async fn test_pepper_is_part_of_the_hash() {
        let first = CredentialHasher::new("pepper_one".to_string());
        let second = CredentialHasher::new("pepper_two".to_string());

        let hash = first.hash("longpassword1").await.unwrap();
        assert!(second.verify("longpassword1", hash).await.is_err());
    }

    #[tokio::test]
    async fn test_garbage_hash_is_a_credential_failure() {
        let hasher = CredentialHasher::new("pepper".to_string());
        assert!(matches!(
            hasher.verify("longpassword1", "not-a-phc-string".to_string()).await,
            Err(AuthError::BadCredential)
        ));
    }

    #[tokio::test]
    async fn test_verify_dummy_never_fails_on_wrong_input() {
        let hasher = CredentialHasher::new("pepper".to_string());
        assert!(hasher.verify_dummy("anything at all").await.is_ok());
        assert!(hasher.verify_dummy("").await.is_ok());
    }
}
