//! Administrative privilege.
//!
//! The first account ever registered becomes the administrator. Privileged
//! operations check the session's captured flag through
//! [`AdminAuthority::require_admin`].

pub mod authority;

pub use authority::AdminAuthority;
