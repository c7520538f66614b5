//! Delivery of verification codes.

use async_trait::async_trait;
use std::time::Duration;

use super::VerificationResult;

/// Sends a verification code to an address
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_code(&self, email: &str, code: &str, ttl: Duration) -> VerificationResult<()>;
}

/// Writes codes to the log instead of sending mail
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_code(&self, email: &str, code: &str, ttl: Duration) -> VerificationResult<()> {
        log::info!(
            "Verification code for {}: {} (valid {} minutes)",
            email,
            code,
            ttl.as_secs() / 60
        );
        Ok(())
    }
}
