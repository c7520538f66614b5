//! Signed session tokens (HS256 JWT).

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use super::errors::{AuthError, AuthResult};
use super::models::{Identity, IssuedToken, TokenClaims, UserId};

/// Validity window of a session token
pub const DEFAULT_TOKEN_VALIDITY: Duration = Duration::hours(24);

/// Issues and validates session tokens with a shared secret.
///
/// Pure over the secret and the claims; binding a token to the session
/// store is the caller's job.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    validity: Duration,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self::with_validity(secret, DEFAULT_TOKEN_VALIDITY)
    }

    pub fn with_validity(secret: &str, validity: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            validity,
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Sign a token for `user_id`/`username` expiring `validity` from now
    pub fn issue(&self, user_id: UserId, username: &str) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.validity;
        let claims = TokenClaims {
            user_id,
            username: username.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::TokenEncoding)?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature and expiry, returning the embedded identity
    pub fn parse(&self, token: &str) -> AuthResult<Identity> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |err| match err.kind() {
                JwtErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            },
        )?;

        Ok(Identity {
            user_id: data.claims.user_id,
            username: data.claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_with_enough_length_0123";

    #[test]
    fn test_issue_and_parse() {
        let service = TokenService::new(SECRET);
        let issued = service.issue(42, "alice").unwrap();

        let identity = service.parse(&issued.token).unwrap();
        assert_eq!(identity.user_id, 42);
        assert_eq!(identity.username, "alice");

        let remaining = issued.expires_at - Utc::now();
        assert!(remaining > Duration::hours(23));
        assert!(remaining <= Duration::hours(24));
    }

    #[test]
    fn test_tokens_are_distinct_within_one_second() {
        let service = TokenService::new(SECRET);
        let first = service.issue(1, "alice").unwrap();
        let second = service.issue(1, "alice").unwrap();

        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_expired_token() {
        let service = TokenService::with_validity(SECRET, Duration::seconds(-10));
        let issued = service.issue(1, "alice").unwrap();

        let result = service.parse(&issued.token);
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let issuer = TokenService::new(SECRET);
        let other = TokenService::new("a_completely_different_secret_value!!");
        let issued = issuer.issue(1, "alice").unwrap();

        assert!(matches!(other.parse(&issued.token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_garbage_is_invalid() {
        let service = TokenService::new(SECRET);

        assert!(matches!(service.parse("not.a.jwt"), Err(AuthError::InvalidToken)));
        assert!(matches!(service.parse(""), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_tampered_payload_is_invalid() {
        let service = TokenService::new(SECRET);
        let issued = service.issue(1, "alice").unwrap();

        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let forged = service.issue(2, "mallory").unwrap();
        let forged_parts: Vec<&str> = forged.token.split('.').collect();
        parts[1] = forged_parts[1];

        assert!(matches!(
            service.parse(&parts.join(".")),
            Err(AuthError::InvalidToken)
        ));
    }
}
