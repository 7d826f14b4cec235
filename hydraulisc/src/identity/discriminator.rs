//! Lowest-free discriminator allocation.
//!
//! Allocation is a read followed by a decision. Two registrations for the
//! same display name can observe the same free value; the account store's
//! uniqueness constraint rejects the loser with
//! [`AuthError::DuplicateIdentity`] and the caller allocates again.

use std::{collections::HashSet, sync::Arc};

use crate::auth::{AuthError, AuthResult};
use crate::db::AccountRepository;

/// Highest discriminator value
pub const MAX_DISCRIMINATOR: u16 = 9999;

/// Render a discriminator as four zero-padded digits
pub fn format_discriminator(value: u16) -> String {
    format!("{value:04}")
}

/// Pick the lowest value in `1..=9999` not present in `used`
pub fn lowest_free<'a, I>(used: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: HashSet<u16> = used.into_iter().filter_map(|d| d.parse().ok()).collect();

    (1..=MAX_DISCRIMINATOR)
        .find(|candidate| !taken.contains(candidate))
        .map(format_discriminator)
}

/// Allocates discriminators against the account store
#[derive(Clone)]
pub struct DiscriminatorAllocator {
    accounts: Arc<dyn AccountRepository>,
}

impl DiscriminatorAllocator {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    /// Find the lowest unused discriminator for `display_name`
    ///
    /// # Errors
    ///
    /// * `AuthError::IdentityExhausted` - all 9999 values are taken
    pub async fn allocate(&self, display_name: &str) -> AuthResult<String> {
        let used = self.accounts.discriminators_for(display_name).await?;

        lowest_free(used.iter().map(String::as_str)).ok_or_else(|| {
            log::warn!("Discriminators exhausted for display name {display_name}");
            AuthError::IdentityExhausted
        })
    }
}
