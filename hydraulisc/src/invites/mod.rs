//! Single-use invite codes.
//!
//! Codes are minted in batches by administrators and consumed at most once
//! by an invite-only registration.

pub mod ledger;
pub mod models;

pub use ledger::{InviteLedger, MAX_INVITE_BATCH};
pub use models::InviteCode;
