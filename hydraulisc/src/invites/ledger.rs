//! Invite ledger: minting and one-shot consumption.

use std::sync::Arc;

use super::models::InviteCode;
use crate::auth::{AuthError, AuthResult};
use crate::db::InviteRepository;

/// Largest batch a single request may mint
pub const MAX_INVITE_BATCH: usize = 100;

/// Mints and consumes invite codes
#[derive(Clone)]
pub struct InviteLedger {
    invites: Arc<dyn InviteRepository>,
}

impl InviteLedger {
    pub fn new(invites: Arc<dyn InviteRepository>) -> Self {
        Self { invites }
    }

    /// Mint `count` fresh unused codes
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidInviteCount` - `count` is 0 or above [`MAX_INVITE_BATCH`]
    pub async fn generate(&self, count: usize) -> AuthResult<Vec<InviteCode>> {
        if count == 0 || count > MAX_INVITE_BATCH {
            return Err(AuthError::InvalidInviteCount {
                requested: count,
                max: MAX_INVITE_BATCH,
            });
        }

        let codes: Vec<String> = (0..count).map(|_| InviteCode::generate_code()).collect();
        let minted = self.invites.insert_batch(&codes).await?;

        log::info!("Minted {} invite codes", minted.len());
        Ok(minted)
    }

    /// Consume a code exactly once
    ///
    /// Of any number of concurrent calls with the same unused code, exactly
    /// one succeeds.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidInvite` - blank, unknown or already used
    pub async fn consume(&self, code: &str) -> AuthResult<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::InvalidInvite);
        }

        if self.invites.consume(code).await? {
            log::debug!("Invite {} consumed", InviteCode::redact(code));
            Ok(())
        } else {
            Err(AuthError::InvalidInvite)
        }
    }

    /// Look up a code without consuming it
    pub async fn find(&self, code: &str) -> AuthResult<Option<InviteCode>> {
        self.invites.find(code.trim()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryInviteRepository;

    fn ledger() -> InviteLedger {
        InviteLedger::new(Arc::new(MemoryInviteRepository::new()))
    }

    #[tokio::test]
    async fn test_generate_distinct_unused_codes() {
        let ledger = ledger();
        let minted = ledger.generate(5).await.unwrap();

        assert_eq!(minted.len(), 5);
        assert!(minted.iter().all(|invite| !invite.used));

        let mut codes: Vec<&str> = minted.iter().map(|i| i.code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 5);
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_counts() {
        let ledger = ledger();
        for count in [0, MAX_INVITE_BATCH + 1] {
            assert!(matches!(
                ledger.generate(count).await,
                Err(AuthError::InvalidInviteCount { requested, .. }) if requested == count
            ));
        }
        assert_eq!(ledger.generate(MAX_INVITE_BATCH).await.unwrap().len(), MAX_INVITE_BATCH);
    }

    #[tokio::test]
    async fn test_consume_once() {
        let ledger = ledger();
        let code = ledger.generate(1).await.unwrap().remove(0).code;

        ledger.consume(&format!("  {code} ")).await.unwrap();
        assert!(matches!(ledger.consume(&code).await, Err(AuthError::InvalidInvite)));
        assert!(ledger.find(&code).await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_consume_unknown_or_blank() {
        let ledger = ledger();
        assert!(matches!(ledger.consume("").await, Err(AuthError::InvalidInvite)));
        assert!(matches!(ledger.consume("   ").await, Err(AuthError::InvalidInvite)));
        assert!(matches!(ledger.consume("deadbeef").await, Err(AuthError::InvalidInvite)));
    }
}
