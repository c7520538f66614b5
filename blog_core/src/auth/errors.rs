//! Authentication error types.

use thiserror::Error;

use super::models::UserId;
use crate::error::ErrorKind;
use crate::store::StoreError;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session store error
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    /// JWT signing failed
    #[error("Token encoding failed: {0}")]
    TokenEncoding(jsonwebtoken::errors::Error),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Unknown username or wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Current password did not match during a password change
    #[error("Current password is incorrect")]
    IncorrectPassword,

    /// User not found
    #[error("User not found")]
    UserNotFound,

    /// Username already exists
    #[error("Username already exists")]
    UsernameTaken,

    /// Email already exists
    #[error("Email already exists")]
    EmailTaken,

    /// Invalid username format
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Password too weak
    #[error("Password too weak: {0}")]
    WeakPassword(String),

    /// Invalid email format
    #[error("Invalid email address")]
    InvalidEmail,

    /// No Authorization header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Authorization header is not `Bearer <token>`
    #[error("Malformed authorization header")]
    MalformedAuthorization,

    /// Signature or structure check failed
    #[error("Invalid token")]
    InvalidToken,

    /// Token is past its expiry
    #[error("Token expired")]
    TokenExpired,

    /// Token is valid but no longer the active session
    #[error("Session revoked")]
    SessionRevoked { user_id: UserId },

    /// No session bound for the user
    #[error("Session not found")]
    SessionNotFound,

    /// Not allowed to act on the target account
    #[error("Permission denied")]
    Forbidden,
}

impl AuthError {
    /// Classification used by the HTTP layer
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Database(_)
            | AuthError::Store(_)
            | AuthError::TokenEncoding(_)
            | AuthError::HashingFailed => ErrorKind::DependencyFailure,
            AuthError::InvalidCredentials
            | AuthError::MissingCredentials
            | AuthError::MalformedAuthorization
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::SessionRevoked { .. }
            | AuthError::SessionNotFound => ErrorKind::Unauthenticated,
            AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::UsernameTaken | AuthError::EmailTaken => ErrorKind::Conflict,
            AuthError::InvalidUsername(_)
            | AuthError::WeakPassword(_)
            | AuthError::InvalidEmail
            | AuthError::IncorrectPassword => ErrorKind::Validation,
        }
    }

    /// User the failure is about, when the token identified one
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            AuthError::SessionRevoked { user_id } => Some(*user_id),
            _ => None,
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database, store and JWT errors are sanitized to prevent information
    /// disclosure about the internal system structure.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Database(_) | AuthError::Store(_) | AuthError::HashingFailed => {
                "Internal server error".to_string()
            }
            AuthError::TokenEncoding(_) => "Authentication failed".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(AuthError::InvalidCredentials.kind(), ErrorKind::Unauthenticated);
        assert_eq!(
            AuthError::SessionRevoked { user_id: 1 }.kind(),
            ErrorKind::Unauthenticated
        );
        assert_eq!(AuthError::IncorrectPassword.kind(), ErrorKind::Validation);
        assert_eq!(AuthError::UsernameTaken.kind(), ErrorKind::Conflict);
        assert_eq!(AuthError::InvalidEmail.kind(), ErrorKind::Validation);
        assert_eq!(AuthError::Forbidden.kind(), ErrorKind::Forbidden);
        assert_eq!(AuthError::UserNotFound.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_client_message_hides_internals() {
        let err = AuthError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");
        assert_eq!(err.kind(), ErrorKind::DependencyFailure);

        let err = AuthError::Store(StoreError::Unavailable("redis down".to_string()));
        assert!(!err.client_message().contains("redis"));
    }

    #[test]
    fn test_user_id_of_revoked_session() {
        assert_eq!(AuthError::SessionRevoked { user_id: 42 }.user_id(), Some(42));
        assert_eq!(AuthError::InvalidToken.user_id(), None);
        assert_eq!(AuthError::MissingCredentials.user_id(), None);
    }
}
