//! Request authentication: bearer token, signature, then session binding.
//!
//! ```text
//! header ──► "Bearer <t>" ──► TokenService::parse ──► SessionStore::lookup == t ──► Identity
//!    │             │                   │                           │
//!    └─────────────┴───────────────────┴───────────────────────────┴──► Required: error
//!                                                                      Optional: anonymous
//! ```

use subtle::ConstantTimeEq;

use super::errors::{AuthError, AuthResult};
use super::models::Identity;
use super::session::SessionStore;
use super::token::TokenService;

/// How a route treats missing or rejected credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Reject the request
    Required,
    /// Continue without an identity
    Optional,
}

impl GateMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GateMode::Required => "required",
            GateMode::Optional => "optional",
        }
    }
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively and the token must be
/// non-empty.
pub fn parse_bearer(header: &str) -> AuthResult<&str> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedAuthorization)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedAuthorization);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedAuthorization);
    }
    Ok(token)
}

/// Authentication gate shared by every protected route
#[derive(Clone)]
pub struct AuthGate {
    tokens: TokenService,
    sessions: SessionStore,
}

impl AuthGate {
    pub fn new(tokens: TokenService, sessions: SessionStore) -> Self {
        Self { tokens, sessions }
    }

    /// Run every check; any failure is returned as-is.
    ///
    /// A token whose signature is fine but which is not the one bound in
    /// the session store (or whose binding cannot be read) is reported as
    /// `SessionRevoked`.
    pub async fn authenticate(&self, header: Option<&str>) -> AuthResult<Identity> {
        let header = header.ok_or(AuthError::MissingCredentials)?;
        let token = parse_bearer(header)?;
        let identity = self.tokens.parse(token)?;

        let bound = match self.sessions.lookup(identity.user_id).await {
            Ok(bound) => bound,
            Err(err) => {
                log::debug!("No usable session for user {}: {}", identity.user_id, err);
                return Err(AuthError::SessionRevoked {
                    user_id: identity.user_id,
                });
            }
        };

        if !bool::from(bound.as_bytes().ct_eq(token.as_bytes())) {
            return Err(AuthError::SessionRevoked {
                user_id: identity.user_id,
            });
        }

        Ok(identity)
    }

    /// Apply `mode` to the outcome of [`authenticate`](Self::authenticate).
    ///
    /// Required mode propagates the failure; optional mode swallows it and
    /// yields `None`.
    pub async fn check(&self, mode: GateMode, header: Option<&str>) -> AuthResult<Option<Identity>> {
        match self.authenticate(header).await {
            Ok(identity) => Ok(Some(identity)),
            Err(err) => match mode {
                GateMode::Required => Err(err),
                GateMode::Optional => {
                    if header.is_some() {
                        log::debug!("Optional gate continuing anonymously: {}", err);
                    }
                    Ok(None)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvStore, MemoryStore};
    use std::sync::Arc;
    use std::time::Duration;

    const SECRET: &str = "gate_test_secret_with_enough_bytes_123";

    fn gate() -> (AuthGate, TokenService, SessionStore) {
        let tokens = TokenService::new(SECRET);
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        (AuthGate::new(tokens.clone(), sessions.clone()), tokens, sessions)
    }

    async fn login(tokens: &TokenService, sessions: &SessionStore, id: i64) -> String {
        let issued = tokens.issue(id, "alice").unwrap();
        sessions
            .bind(id, &issued.token, Duration::from_secs(60))
            .await
            .unwrap();
        issued.token
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc").unwrap(), "abc");
        assert_eq!(parse_bearer("bearer abc").unwrap(), "abc");
        assert_eq!(parse_bearer("BEARER  abc ").unwrap(), "abc");

        assert!(parse_bearer("abc").is_err());
        assert!(parse_bearer("Basic abc").is_err());
        assert!(parse_bearer("Bearer ").is_err());
        assert!(parse_bearer("").is_err());
    }

    #[tokio::test]
    async fn test_valid_bound_token() {
        let (gate, tokens, sessions) = gate();
        let token = login(&tokens, &sessions, 1).await;

        let identity = gate
            .authenticate(Some(&format!("Bearer {token}")))
            .await
            .unwrap();
        assert_eq!(identity.user_id, 1);
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn test_superseded_token_is_revoked() {
        let (gate, tokens, sessions) = gate();
        let first = login(&tokens, &sessions, 1).await;
        let second = login(&tokens, &sessions, 1).await;

        let result = gate.authenticate(Some(&format!("Bearer {first}"))).await;
        assert!(matches!(result, Err(AuthError::SessionRevoked { user_id: 1 })));
        assert_eq!(result.unwrap_err().user_id(), Some(1));

        assert!(gate.authenticate(Some(&format!("Bearer {second}"))).await.is_ok());
    }

    #[tokio::test]
    async fn test_unbound_token_is_rejected() {
        let (gate, tokens, _) = gate();
        let issued = tokens.issue(1, "alice").unwrap();

        let result = gate.authenticate(Some(&format!("Bearer {}", issued.token))).await;
        assert!(matches!(result, Err(AuthError::SessionRevoked { .. })));
    }

    #[tokio::test]
    async fn test_required_mode_errors() {
        let (gate, _, _) = gate();

        assert!(matches!(
            gate.check(GateMode::Required, None).await,
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            gate.check(GateMode::Required, Some("Token xyz")).await,
            Err(AuthError::MalformedAuthorization)
        ));
        assert!(matches!(
            gate.check(GateMode::Required, Some("Bearer xyz")).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_optional_mode_continues_anonymously() {
        let (gate, tokens, sessions) = gate();

        assert_eq!(gate.check(GateMode::Optional, None).await.unwrap(), None);
        assert_eq!(
            gate.check(GateMode::Optional, Some("Bearer xyz")).await.unwrap(),
            None
        );

        let token = login(&tokens, &sessions, 3).await;
        let identity = gate
            .check(GateMode::Optional, Some(&format!("Bearer {token}")))
            .await
            .unwrap();
        assert_eq!(identity.map(|i| i.user_id), Some(3));
    }

    #[tokio::test]
    async fn test_mismatched_binding_of_same_length() {
        let tokens = TokenService::new(SECRET);
        let store = Arc::new(MemoryStore::new());
        let gate = AuthGate::new(tokens.clone(), SessionStore::new(store.clone()));

        let issued = tokens.issue(5, "alice").unwrap();
        let mut other = issued.token.clone().into_bytes();
        let last = other.len() - 1;
        other[last] = if other[last] == b'A' { b'B' } else { b'A' };
        store
            .set_ex(
                "user_token:5",
                &String::from_utf8(other).unwrap(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let result = gate.authenticate(Some(&format!("Bearer {}", issued.token))).await;
        assert!(matches!(result, Err(AuthError::SessionRevoked { .. })));
    }

    #[tokio::test]
    async fn test_expired_bound_token_in_both_modes() {
        let tokens = TokenService::with_validity(SECRET, chrono::Duration::seconds(-10));
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        let gate = AuthGate::new(tokens.clone(), sessions.clone());

        // Bound in the store, so only the expiry can reject it
        let token = login(&tokens, &sessions, 9).await;
        let header = format!("Bearer {token}");

        assert!(matches!(
            gate.check(GateMode::Required, Some(&header)).await,
            Err(AuthError::TokenExpired)
        ));
        assert_eq!(gate.check(GateMode::Optional, Some(&header)).await.unwrap(), None);
    }
}
