//! Single active session per user, mirrored in the key-value store.

use std::sync::Arc;
use std::time::Duration;

use super::errors::{AuthError, AuthResult};
use super::models::UserId;
use crate::store::KvStore;

/// Store key holding the active token of `user_id`
pub fn session_key(user_id: UserId) -> String {
    format!("user_token:{user_id}")
}

/// Binds the one currently valid token of each user.
///
/// Binding overwrites unconditionally (last writer wins), which is what
/// revokes the previous token at login.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KvStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn bind(&self, user_id: UserId, token: &str, ttl: Duration) -> AuthResult<()> {
        self.store.set_ex(&session_key(user_id), token, ttl).await?;
        Ok(())
    }

    /// The bound token, `SessionNotFound` if absent or expired
    pub async fn lookup(&self, user_id: UserId) -> AuthResult<String> {
        self.store
            .get(&session_key(user_id))
            .await?
            .ok_or(AuthError::SessionNotFound)
    }

    pub async fn unbind(&self, user_id: UserId) -> AuthResult<()> {
        self.store.delete(&session_key(user_id)).await?;
        Ok(())
    }
}
