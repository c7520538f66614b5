//! Mapping of domain errors to HTTP responses.
//!
//! Every failure leaves the server as `{"error": "<message>"}` with a status
//! derived from its [`ErrorKind`]. Internal details are logged, never sent.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use blog_core::ErrorKind;
use blog_core::auth::AuthError;
use blog_core::content::ContentError;
use blog_core::verification::VerificationError;
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    /// Seconds until a pending verification code expires
    wait: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<u64>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            wait: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.kind)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::DependencyFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            wait: self.wait,
        };
        (status_for(self.kind), Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.kind() == ErrorKind::DependencyFailure {
            tracing::error!(error = %err, "Authentication backend failure");
        }
        Self::new(err.kind(), err.client_message())
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        if err.kind() == ErrorKind::DependencyFailure {
            tracing::error!(error = %err, "Content backend failure");
        }
        Self::new(err.kind(), err.client_message())
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        if err.kind() == ErrorKind::DependencyFailure {
            tracing::error!(error = %err, "Verification backend failure");
        }
        let wait = match &err {
            VerificationError::AlreadyPending { wait } => Some(wait.as_secs()),
            _ => None,
        };
        Self {
            kind: err.kind(),
            message: err.client_message(),
            wait,
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::validation(format!("Malformed upload: {}", err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(ErrorKind::DependencyFailure),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_pending_code_carries_wait() {
        let err = ApiError::from(VerificationError::AlreadyPending {
            wait: Duration::from_secs(240),
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.wait, Some(240));
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = ApiError::from(ContentError::Blob(std::io::Error::other("/srv/img is full")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("/srv/img"));
    }
}
