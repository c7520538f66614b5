//! Account handlers under `/user`.
//!
//! Register a new user:
//! ```bash
//! curl -X POST http://localhost:8080/user/register \
//!   -H "Content-Type: application/json" \
//!   -d '{"username": "alice", "password": "Secret123", "email": "alice@example.com"}'
//! ```
//!
//! Login:
//! ```bash
//! curl -X POST http://localhost:8080/user/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"username": "alice", "password": "Secret123"}'
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use blog_core::ErrorKind;
use blog_core::auth::{
    AuthError, DEFAULT_PAGE_SIZE, LoginRequest, LoginResponse, PasswordChange, ProfileUpdate,
    RegisterRequest, User, UserId, UserPage,
};
use serde::Deserialize;

use super::AppState;
use super::error::ApiError;
use super::middleware::AuthUser;
use crate::logging::{SecurityEvent, log_security_event};
use crate::metrics;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn resolve(&self) -> (u32, u32) {
        (
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }
}

/// Create an account. The response never contains password material.
///
/// # Errors
///
/// - `400 Bad Request`: invalid username, weak password or malformed email
/// - `409 Conflict`: username or email already taken
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.auth_manager.register(request).await?;
    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in and receive a session token. Any earlier token of the same user
/// stops working.
///
/// # Errors
///
/// - `401 Unauthorized`: unknown user or wrong password (indistinguishable)
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = request.username.clone();

    match state.auth_manager.login(request).await {
        Ok(response) => {
            metrics::auth_logins_total("success");
            Ok(Json(response))
        }
        Err(err) => {
            if err.kind() == ErrorKind::Unauthenticated {
                metrics::auth_logins_total("invalid_credentials");
                log_security_event(
                    SecurityEvent::FailedLogin,
                    None,
                    &format!("Invalid credentials for {username}"),
                );
            } else {
                metrics::auth_logins_total("error");
            }
            Err(err.into())
        }
    }
}

/// Revoke the caller's session
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<StatusCode, ApiError> {
    state.auth_manager.logout(identity.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change the caller's password; the current session is revoked.
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(change): Json<PasswordChange>,
) -> Result<StatusCode, ApiError> {
    state
        .auth_manager
        .change_password(identity.user_id, change)
        .await
        .inspect_err(|err| {
            if matches!(err, AuthError::IncorrectPassword) {
                log_security_event(
                    SecurityEvent::FailedPasswordChange,
                    Some(identity.user_id),
                    "Old password did not verify",
                );
            }
        })?;
    Ok(StatusCode::NO_CONTENT)
}

/// Page through all users (admin only)
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserPage>, ApiError> {
    let (page, page_size) = query.resolve();
    let users = state
        .auth_manager
        .list_users(&identity, page, page_size)
        .await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.auth_manager.get_user(user_id).await?))
}

/// Update email or avatar (self or admin); only admins may grant admin
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(user_id): Path<UserId>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .auth_manager
        .update_profile(&identity, user_id, update)
        .await?;
    Ok(Json(user))
}

/// Delete an account with its posts and comments (self or admin)
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<StatusCode, ApiError> {
    state.auth_manager.delete_user(&identity, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
