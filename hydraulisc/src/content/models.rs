//! Post models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AccountId;

/// Post ID type
pub type PostId = i64;

/// A post record; the uploaded file itself lives outside the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub account_id: AccountId,
    pub title: String,
    /// Stored path of the uploaded file
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

/// Post creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub filename: String,
}
