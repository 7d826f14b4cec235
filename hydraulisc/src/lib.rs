//! # Hydraulisc
//!
//! Identity and admission control for the Hydraulisc blog.
//!
//! Accounts are identified externally by a display name plus a four digit
//! discriminator (`Ami#0001`). Registration is gated by a configurable
//! admission mode, invite codes are single use, and the very first account
//! ever created becomes the bootstrap administrator.
//!
//! ## Core Modules
//!
//! - [`admission`]: Admission modes and the registration gate
//! - [`auth`]: Registration, login, logout and rolling sessions
//! - [`identity`]: Identity parsing, discriminator allocation, profiles
//! - [`invites`]: The single-use invite ledger
//! - [`admin`]: Privilege checks and administrator-only operations
//! - [`content`]: Posts and owner-only deletion
//! - [`security`]: Per-client rate limiting and token generation
//! - [`db`]: PostgreSQL and in-memory persistence
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
//! let auth = AuthManager::new(&stores, "a_long_server_side_pepper".to_string());
//!
//! let (account, session) = auth
//!     .register(
//!         RegisterRequest {
//!             display_name: "Ami".to_string(),
//!             password: "longpassword1".to_string(),
//!             invite_code: None,
//!         },
//!         AdmissionMode::Open,
//!         "127.0.0.1",
//!     )
//!     .await?;
//!
//! assert_eq!(account.identity(), "Ami#0001");
//! assert!(account.is_admin);
//! assert_eq!(session.account_id, account.id);
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod admission;
pub mod auth;
pub mod content;
pub mod db;
pub mod identity;
pub mod invites;
pub mod security;

pub use admin::AdminAuthority;
pub use admission::{AdmissionConfig, AdmissionDecision, AdmissionMode, AdmissionPolicy};
pub use auth::{Account, AccountId, AuthError, AuthManager, AuthResult, Session};
pub use content::PostManager;
pub use identity::{DiscriminatorAllocator, Identity, ProfileManager};
pub use invites::{InviteCode, InviteLedger};
