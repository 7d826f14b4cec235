//! Public identities: display name plus discriminator.
//!
//! A display name alone is not unique. Accounts sharing a display name are
//! told apart by a four digit discriminator, and the pair is rendered as
//! `Name#0001`.

use std::{fmt, str::FromStr};

use crate::auth::{AuthError, AuthResult};

pub mod discriminator;
pub mod profile;

pub use discriminator::{DiscriminatorAllocator, MAX_DISCRIMINATOR, format_discriminator};
pub use profile::ProfileManager;

/// Maximum display name length in characters
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Parsed `Name#DDDD` identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub display_name: String,
    pub discriminator: String,
}

impl Identity {
    pub fn new(display_name: impl Into<String>, discriminator: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            discriminator: discriminator.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.display_name, self.discriminator)
    }
}

impl FromStr for Identity {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, discriminator) = s.split_once('#').ok_or(AuthError::MalformedIdentity)?;

        if !is_valid_discriminator(discriminator) {
            return Err(AuthError::MalformedIdentity);
        }

        if name.is_empty()
            || name.chars().count() > MAX_DISPLAY_NAME_LEN
            || !name.chars().all(is_display_name_char)
        {
            return Err(AuthError::MalformedIdentity);
        }

        Ok(Self::new(name, discriminator))
    }
}

/// Characters allowed in a display name
pub fn is_display_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.'
}

/// Exactly four ASCII digits in `0001..=9999`
pub fn is_valid_discriminator(discriminator: &str) -> bool {
    discriminator.len() == 4
        && discriminator.bytes().all(|b| b.is_ascii_digit())
        && discriminator != "0000"
}

/// Validate display name format and return it trimmed
pub fn validate_display_name(display_name: &str) -> AuthResult<String> {
    let trimmed = display_name.trim();

    if trimmed.is_empty() {
        return Err(AuthError::InvalidDisplayName(
            "Display name must not be empty".to_string(),
        ));
    }

    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(AuthError::InvalidDisplayName(format!(
            "Display name must be at most {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }

    if !trimmed.chars().all(is_display_name_char) {
        return Err(AuthError::InvalidDisplayName(
            "Display name can only contain letters, numbers, and periods".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}
