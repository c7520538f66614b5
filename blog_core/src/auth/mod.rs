//! Authentication module providing accounts, session tokens and the
//! request gate.
//!
//! This module implements:
//! - Argon2id password hashing with server-side pepper
//! - HS256 JWT session tokens (24-hour expiry)
//! - One active session per user, bound at `user_token:<id>` in the
//!   key-value store; a new login replaces (revokes) the previous token
//! - A gate with required and optional modes
//!
//! ## Example
//!
//! ```no_run
//! use blog_core::auth::{
//!     AuthManager, CredentialHasher, LoginRequest, RegisterRequest, SessionStore, TokenService,
//! };
//! use blog_core::db::{Database, SqliteUserRepository};
//! use blog_core::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::in_memory().await?;
//!     let auth = AuthManager::new(
//!         Arc::new(SqliteUserRepository::new(db.pool().clone())),
//!         CredentialHasher::new("secret_pepper".to_string()),
//!         TokenService::new("jwt_secret_at_least_thirty_two_bytes"),
//!         SessionStore::new(Arc::new(MemoryStore::new())),
//!     );
//!
//!     auth.register(RegisterRequest {
//!         username: "alice".to_string(),
//!         password: "Secret123".to_string(),
//!         email: Some("alice@example.com".to_string()),
//!     })
//!     .await?;
//!
//!     let login = auth
//!         .login(LoginRequest {
//!             username: "alice".to_string(),
//!             password: "Secret123".to_string(),
//!         })
//!         .await?;
//!
//!     let header = format!("Bearer {}", login.token);
//!     let identity = auth.gate().authenticate(Some(&header)).await?;
//!     println!("Authenticated as {}", identity.username);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod gate;
pub mod manager;
pub mod models;
pub mod password;
pub mod session;
pub mod token;

pub use errors::{AuthError, AuthResult};
pub use gate::{AuthGate, GateMode, parse_bearer};
pub use manager::{AuthManager, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, normalize_page};
pub use models::{
    Identity, IssuedToken, LoginRequest, LoginResponse, PasswordChange, ProfileUpdate,
    RegisterRequest, TokenClaims, User, UserCredentials, UserId, UserPage,
};
pub use password::CredentialHasher;
pub use session::{SessionStore, session_key};
pub use token::{DEFAULT_TOKEN_VALIDITY, TokenService};
