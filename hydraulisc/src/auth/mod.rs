//! Authentication module providing registration, login, and server-side sessions.
//!
//! This module implements:
//! - Argon2id password hashing with server-side pepper, off the async workers
//! - `Name#0001` identities with lowest-free discriminator allocation
//! - Admission-gated registration with single-use invite codes
//! - Opaque session tokens with a rolling expiry
//! - Per-client rate limits on login and registration
//!
//! ## Example
//!
//! ```
//! use hydraulisc::admission::AdmissionMode;
//! use hydraulisc::auth::{AuthManager, RegisterRequest};
//! use hydraulisc::db::Stores;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stores = Stores::in_memory();
//! let auth = AuthManager::new(&stores, "secret_pepper_value".to_string());
//!
//! let request = RegisterRequest {
//!     display_name: "Ami".to_string(),
//!     password: "longpassword1".to_string(),
//!     invite_code: None,
//! };
//!
//! let (account, session) = auth.register(request, AdmissionMode::Open, "127.0.0.1").await?;
//! assert_eq!(account.identity(), "Ami#0001");
//! assert!(session.is_admin);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod password;

pub use errors::{AuthError, AuthResult};
pub use manager::{AuthManager, DEFAULT_SESSION_TTL_SECS, MAX_IDENTITY_ATTEMPTS};
pub use models::{
    Account, AccountId, LoginRequest, NewAccount, ProfileDefaults, ProfileUpdate, RegisterRequest,
    Session,
};
pub use password::{CredentialHasher, validate_password};
