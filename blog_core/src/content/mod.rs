//! Posts and everything attached to them: tags, comments and files.
//!
//! Every multi-row mutation runs in one SQLite transaction so that no
//! partial write is ever visible. The schema has no cascading foreign
//! keys; dependents are removed explicitly, in dependency order:
//!
//! ```text
//! delete content:  content_tags → content_files → comments → contents
//! attach tags:     per id: skip if linked, else tag must exist, insert
//! attach files:    order = COALESCE(MAX(sort_order), -1) + 1 + index
//! upload:          blob write → [file_records (+ content_files)] → on failure delete blob
//! ```

pub mod blob;
pub mod comments;
pub mod errors;
pub mod files;
pub mod manager;
pub mod models;
pub mod tags;

pub use blob::{BlobStore, LocalBlobStore, StoredBlob};
pub use comments::CommentManager;
pub use errors::{ContentError, ContentResult};
pub use files::{DEFAULT_MAX_UPLOAD_BYTES, FileManager};
pub use manager::ContentManager;
pub use tags::TagManager;
pub use models::{
    AttachedFile, Author, Comment, CommentId, CommentView, Content, ContentDetail, ContentId,
    ContentPage, ContentStatus, ContentSummary, ContentUpdate, DeletionSummary, FileId,
    FileRecord, NewContent, NewTag, NewUpload, Tag, TagId, TagUpdate, TagWithCount,
};

use sqlx::{Row, SqliteConnection};

use crate::auth::UserId;

/// Whether `user_id` exists and is an administrator
pub(crate) async fn is_admin(conn: &mut SqliteConnection, user_id: UserId) -> ContentResult<bool> {
    let row = sqlx::query("SELECT is_admin FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.is_some_and(|r| r.get::<bool, _>("is_admin")))
}

/// Author of `content_id`, `ContentNotFound` if it does not exist
pub(crate) async fn content_owner(
    conn: &mut SqliteConnection,
    content_id: ContentId,
) -> ContentResult<UserId> {
    let row = sqlx::query("SELECT user_id FROM contents WHERE id = ?")
        .bind(content_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ContentError::ContentNotFound(content_id))?;

    Ok(row.get("user_id"))
}

/// Content must exist and belong to `requester`, unless `requester` is an admin
pub(crate) async fn ensure_owner_or_admin(
    conn: &mut SqliteConnection,
    content_id: ContentId,
    requester: UserId,
) -> ContentResult<()> {
    let owner = content_owner(conn, content_id).await?;
    if owner == requester || is_admin(conn, requester).await? {
        Ok(())
    } else {
        Err(ContentError::Forbidden)
    }
}

/// First free position in the file list of `content_id`; no rows counts as -1
pub(crate) async fn next_file_order(
    conn: &mut SqliteConnection,
    content_id: ContentId,
) -> ContentResult<i64> {
    let row = sqlx::query(
        "SELECT COALESCE(MAX(sort_order), -1) AS max_order FROM content_files WHERE content_id = ?",
    )
    .bind(content_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get::<i64, _>("max_order") + 1)
}

pub(crate) async fn insert_content_file(
    conn: &mut SqliteConnection,
    content_id: ContentId,
    file_id: FileId,
    order: i64,
    usage: &str,
) -> ContentResult<()> {
    sqlx::query(
        "INSERT INTO content_files (content_id, file_id, sort_order, usage) VALUES (?, ?, ?, ?)",
    )
    .bind(content_id)
    .bind(file_id)
    .bind(order)
    .bind(usage)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Author row for display, falling back to an empty profile for missing users
pub(crate) async fn fetch_author(conn: &mut SqliteConnection, user_id: UserId) -> ContentResult<Author> {
    let row = sqlx::query("SELECT id, username, avatar FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(match row {
        Some(r) => Author {
            id: r.get("id"),
            username: r.get("username"),
            avatar: r.get("avatar"),
        },
        None => Author {
            id: user_id,
            username: String::new(),
            avatar: String::new(),
        },
    })
}
