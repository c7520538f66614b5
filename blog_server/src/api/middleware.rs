//! Authentication middleware and extractors.
//!
//! Routes opt into the gate with one of two layers:
//!
//! - [`require_auth`] rejects the request when the gate fails
//! - [`optional_auth`] lets it through anonymously
//!
//! On success the [`Identity`] is stored in the request extensions and
//! handlers read it back with [`AuthUser`] or [`MaybeUser`].
//!
//! ```rust,no_run
//! use axum::{Router, middleware, routing::get};
//! use blog_server::api::AppState;
//! use blog_server::api::middleware::{AuthUser, require_auth};
//! # let state: AppState = unimplemented!();
//!
//! async fn whoami(AuthUser(identity): AuthUser) -> String {
//!     format!("Authenticated as {}", identity.username)
//! }
//!
//! let protected: Router<AppState> = Router::new()
//!     .route("/whoami", get(whoami))
//!     .layer(middleware::from_fn_with_state(state, require_auth));
//! # let _ = protected;
//! ```

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use blog_core::auth::{GateMode, Identity};
use std::convert::Infallible;

use super::AppState;
use super::error::ApiError;
use crate::logging::{SecurityEvent, log_security_event};
use crate::metrics;

/// Gate in required mode
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    run_gate(&state, GateMode::Required, request, next).await
}

/// Gate in optional mode
pub async fn optional_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    run_gate(&state, GateMode::Optional, request, next).await
}

async fn run_gate(
    state: &AppState,
    mode: GateMode,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    match state.gate.check(mode, header.as_deref()).await {
        Ok(identity) => {
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }
            Ok(next.run(request).await)
        }
        Err(err) => {
            metrics::auth_gate_rejections_total(mode.as_str());
            log_security_event(SecurityEvent::GateRejected, err.user_id(), &err.to_string());
            Err(err.into())
        }
    }
}

/// Identity of a request that passed the gate in required mode
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| ApiError::unauthenticated("Authentication required"))
    }
}

/// Identity of a request behind the optional gate, `None` for anonymous
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<Identity>().cloned()))
    }
}
