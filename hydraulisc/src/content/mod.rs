//! User posts.
//!
//! Only the record is managed here. Storing the uploaded file is the job of
//! whoever serves the upload.

pub mod manager;
pub mod models;

pub use manager::{MAX_TITLE_LEN, PostManager};
pub use models::{NewPost, Post, PostId};
