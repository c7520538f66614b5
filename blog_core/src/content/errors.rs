//! Content error types.

use thiserror::Error;

use super::models::{CommentId, ContentId, FileId, TagId};
use crate::error::ErrorKind;

/// Content errors
#[derive(Debug, Error)]
pub enum ContentError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Blob storage error
    #[error("Blob storage error: {0}")]
    Blob(#[from] std::io::Error),

    #[error("Content {0} not found")]
    ContentNotFound(ContentId),

    #[error("Tag {0} not found")]
    TagNotFound(TagId),

    #[error("File {0} not found")]
    FileNotFound(FileId),

    #[error("Comment {0} not found")]
    CommentNotFound(CommentId),

    /// Nothing to detach
    #[error("Association not found")]
    AssociationNotFound,

    #[error("Tag name already exists: {0}")]
    TagNameTaken(String),

    #[error("File {0} is already attached to this content")]
    FileAlreadyAttached(FileId),

    /// Requester neither owns the resource nor is an admin
    #[error("Permission denied")]
    Forbidden,

    #[error("File too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Malformed input
    #[error("Invalid input: {0}")]
    Validation(String),
}

impl ContentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContentError::Database(_) | ContentError::Blob(_) => ErrorKind::DependencyFailure,
            ContentError::ContentNotFound(_)
            | ContentError::TagNotFound(_)
            | ContentError::FileNotFound(_)
            | ContentError::CommentNotFound(_)
            | ContentError::AssociationNotFound => ErrorKind::NotFound,
            ContentError::TagNameTaken(_) | ContentError::FileAlreadyAttached(_) => {
                ErrorKind::Conflict
            }
            ContentError::Forbidden => ErrorKind::Forbidden,
            ContentError::FileTooLarge { .. }
            | ContentError::UnsupportedFileType(_)
            | ContentError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            // Sanitize database and filesystem errors
            ContentError::Database(_) | ContentError::Blob(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for content operations
pub type ContentResult<T> = Result<T, ContentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ContentError::TagNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(ContentError::FileAlreadyAttached(1).kind(), ErrorKind::Conflict);
        assert_eq!(ContentError::Forbidden.kind(), ErrorKind::Forbidden);
        assert_eq!(
            ContentError::FileTooLarge { size: 2, max: 1 }.kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_client_message_hides_io_detail() {
        let err = ContentError::Blob(std::io::Error::other("/srv/img: disk full"));
        assert_eq!(err.client_message(), "Internal server error");
        assert_eq!(err.kind(), ErrorKind::DependencyFailure);
    }
}
