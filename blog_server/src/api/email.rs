//! Email verification handlers under `/email`.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use super::AppState;
use super::error::ApiError;
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct SendCodePayload {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SendCodeResponse {
    pub message: String,
    /// Seconds the code stays valid
    pub expire_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct CheckCodePayload {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Send a verification code
///
/// While a code for the address is outstanding the request is refused with
/// `409 Conflict` and `{"error": ..., "wait": <seconds>}`; the outstanding
/// code and its expiry are left alone.
pub async fn send_code(
    State(state): State<AppState>,
    Json(payload): Json<SendCodePayload>,
) -> Result<Json<SendCodeResponse>, ApiError> {
    state
        .verification
        .send(&payload.email, state.mailer.as_ref())
        .await?;
    metrics::verification_codes_issued_total();

    Ok(Json(SendCodeResponse {
        message: "Verification code sent".to_string(),
        expire_in: state.verification.ttl().as_secs(),
    }))
}

/// Check a code; a match consumes it
pub async fn check_code(
    State(state): State<AppState>,
    Json(payload): Json<CheckCodePayload>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state
        .verification
        .verify(&payload.email, &payload.code)
        .await?
    {
        return Err(ApiError::unauthenticated(
            "Invalid or expired verification code",
        ));
    }

    Ok(Json(MessageResponse {
        message: "Email verified".to_string(),
    }))
}
