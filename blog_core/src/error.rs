//! Error classification shared by every module.
//!
//! Module errors (`AuthError`, `ContentError`, ...) stay specific, but each
//! one reports an [`ErrorKind`] so that the HTTP layer can map failures to
//! status codes without matching on every variant.

use serde::Serialize;

/// Classification of a failure, independent of the module that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing, malformed, invalid, expired or revoked credentials
    Unauthenticated,
    /// Authenticated, but not the owner of the resource (nor an admin)
    Forbidden,
    /// A referenced user, content, tag, comment or file does not exist
    NotFound,
    /// Duplicate resource, or a resource that is still pending
    Conflict,
    /// Malformed input
    Validation,
    /// Relational store, key-value store or blob storage failed
    DependencyFailure,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation_error",
            ErrorKind::DependencyFailure => "dependency_failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
