//! Email verification codes.
//!
//! A code lives at `email:verify:<email>` for five minutes. Only one code
//! per address may be outstanding; it is consumed by the first matching
//! [`VerificationService::verify`] call and survives mismatches until it
//! expires.
//!
//! Generation uses the store's atomic set-if-absent and consumption its
//! compare-and-delete, so neither two concurrent requests for the same
//! address nor two concurrent checks of the same code can both succeed.

pub mod mailer;

pub use mailer::{LogMailer, Mailer};

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::store::{KvStore, StoreError};

/// Default number of characters in a code
pub const DEFAULT_CODE_LENGTH: usize = 10;

/// How long a code stays valid
pub const CODE_TTL: Duration = Duration::from_secs(300);

/// Verification errors
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A live code already exists for the address
    #[error("A verification code was already sent, retry in {} seconds", wait.as_secs())]
    AlreadyPending { wait: Duration },

    #[error("Invalid email address")]
    InvalidEmail,

    /// The mailer could not hand the code off
    #[error("Failed to deliver verification code: {0}")]
    Delivery(String),
}

impl VerificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerificationError::Store(_) | VerificationError::Delivery(_) => {
                ErrorKind::DependencyFailure
            }
            VerificationError::AlreadyPending { .. } => ErrorKind::Conflict,
            VerificationError::InvalidEmail => ErrorKind::Validation,
        }
    }

    pub fn client_message(&self) -> String {
        match self {
            VerificationError::Store(_) => "Internal server error".to_string(),
            VerificationError::Delivery(_) => "Failed to send verification email".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type VerificationResult<T> = Result<T, VerificationError>;

/// Store key for the outstanding code of `email`
pub fn verification_key(email: &str) -> String {
    format!("email:verify:{email}")
}

/// Random code of `length` ASCII letters and digits
pub fn generate_code(length: usize) -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Issues, checks and discards verification codes
#[derive(Clone)]
pub struct VerificationService {
    store: Arc<dyn KvStore>,
    code_length: usize,
    ttl: Duration,
}

impl VerificationService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_code_length(store, DEFAULT_CODE_LENGTH)
    }

    pub fn with_code_length(store: Arc<dyn KvStore>, code_length: usize) -> Self {
        Self {
            store,
            code_length,
            ttl: CODE_TTL,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create and store a new code for `email`.
    ///
    /// Fails with `AlreadyPending` while a previous code is live, leaving
    /// that code and its expiry untouched.
    pub async fn generate(&self, email: &str) -> VerificationResult<String> {
        crate::auth::manager::validate_email(email).map_err(|_| VerificationError::InvalidEmail)?;

        let key = verification_key(email);
        let code = generate_code(self.code_length);

        if !self.store.set_nx_ex(&key, &code, self.ttl).await? {
            let wait = self.store.ttl(&key).await?.unwrap_or_default();
            return Err(VerificationError::AlreadyPending { wait });
        }

        Ok(code)
    }

    /// Generate a code and hand it to `mailer`.
    ///
    /// If delivery fails the code is discarded so the caller can retry
    /// immediately.
    pub async fn send(&self, email: &str, mailer: &dyn Mailer) -> VerificationResult<()> {
        let code = self.generate(email).await?;

        if let Err(err) = mailer.send_code(email, &code, self.ttl).await {
            log::warn!("Verification mail to {} failed: {}", email, err);
            self.discard(email).await?;
            return Err(err);
        }

        Ok(())
    }

    /// Check `code` against the stored one; a match consumes it.
    ///
    /// An absent (expired or never issued) code is simply not valid.
    pub async fn verify(&self, email: &str, code: &str) -> VerificationResult<bool> {
        let key = verification_key(email);
        let Some(stored) = self.store.get(&key).await? else {
            return Ok(false);
        };

        if !bool::from(stored.as_bytes().ct_eq(code.as_bytes())) {
            return Ok(false);
        }

        // Another check may have consumed the same code since the read
        Ok(self.store.compare_and_delete(&key, &stored).await?)
    }

    /// Time until the outstanding code expires, `None` if there is none
    pub async fn ttl_remaining(&self, email: &str) -> VerificationResult<Option<Duration>> {
        Ok(self.store.ttl(&verification_key(email)).await?)
    }

    /// Drop the outstanding code, if any
    pub async fn discard(&self, email: &str) -> VerificationResult<()> {
        self.store.delete(&verification_key(email)).await?;
        Ok(())
    }
}
