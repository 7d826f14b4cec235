//! Invite code models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::security::random_hex;

/// Random bytes per invite code (128 bits)
pub const INVITE_CODE_BYTES: usize = 16;

/// A single-use admission ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteCode {
    pub code: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl InviteCode {
    /// Generate a new unguessable code (32 lowercase hex characters)
    pub fn generate_code() -> String {
        random_hex(INVITE_CODE_BYTES)
    }

    /// Enough of a code to find it in the ledger, not enough to redeem it
    pub fn redact(code: &str) -> String {
        let prefix: String = code.chars().take(6).collect();
        format!("{prefix}…")
    }
}
