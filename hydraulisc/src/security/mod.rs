//! Security module providing rate limiting and token generation.
//!
//! ## Rate Limiting
//!
//! Protects the credential endpoints from guessing, keyed by client address:
//! - **Login**: 10 attempts per 15 minutes
//! - **Registration**: 5 attempts per hour
//!
//! Both limits can be overridden through environment variables, see
//! [`RateLimitConfig`].
//!
//! ## Example
//!
//! ```
//! use hydraulisc::security::{RateLimitResult, RateLimiter};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiter::new();
//! let result = limiter.check_and_record("login", "192.168.1.1").await?;
//!
//! if let RateLimitResult::Allowed { remaining } = result {
//!     println!("Login allowed, {remaining} attempts remaining");
//! }
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod rate_limiter;
pub mod tokens;

pub use errors::{RateLimitError, RateLimiterResult};
pub use rate_limiter::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use tokens::random_hex;
