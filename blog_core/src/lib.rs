//! # Blog Core
//!
//! Accounts, sessions and consistent content writes for a blog backend.
//!
//! The crate is organised around two concerns:
//!
//! - **Authentication**: HS256 session tokens whose single active instance
//!   per user is mirrored in a key-value store (`user_token:<id>`), so that a
//!   new login revokes the previous token. A gate with required and optional
//!   modes turns an `Authorization` header into a typed [`auth::Identity`].
//! - **Transactional writes**: content deletion, tag and file attachment and
//!   file upload run as all-or-nothing SQLite transactions, removing
//!   dependent rows in foreign-key order.
//!
//! Short-lived email verification codes (`email:verify:<email>`) share the
//! key-value store with sessions.
//!
//! ## Core Modules
//!
//! - [`auth`]: accounts, password hashing, tokens, sessions and the gate
//! - [`content`]: posts, tags, comments, files and blob storage
//! - [`db`]: SQLite pool, migrations and the account repository
//! - [`store`]: key-value store trait with Redis and in-memory backends
//! - [`verification`]: email verification codes and delivery
//!
//! ## Example
//!
//! ```no_run
//! use blog_core::content::{ContentManager, NewContent};
//! use blog_core::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::in_memory().await?;
//!     let contents = ContentManager::new(Arc::new(db.pool().clone()));
//!
//!     let post = contents
//!         .create(1, NewContent { title: "Hello".to_string(), ..Default::default() })
//!         .await?;
//!     contents.delete(1, post.id).await?;
//!     Ok(())
//! }
//! ```

/// Accounts, tokens, sessions and the authentication gate.
pub mod auth;

/// Posts, tags, comments and file attachments.
pub mod content;

/// Database connection pool and repositories.
pub mod db;

/// Error classification shared across modules.
pub mod error;
pub use error::ErrorKind;

/// Expiring key-value storage.
pub mod store;

/// Email verification codes.
pub mod verification;
