//! Comment manager.

use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;

use super::errors::{ContentError, ContentResult};
use super::models::{Comment, CommentId, CommentView, ContentId};
use super::{content_owner, fetch_author, is_admin};
use crate::auth::UserId;

const COMMENT_COLUMNS: &str = "id, body, user_id, content_id, created_at, updated_at";

fn validate_body(body: &str) -> ContentResult<&str> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ContentError::Validation("Comment cannot be empty".to_string()));
    }
    Ok(body)
}

async fn fetch_comment(conn: &mut SqliteConnection, id: CommentId) -> ContentResult<Comment> {
    let row = sqlx::query(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ContentError::CommentNotFound(id))?;

    Ok(Comment::from_row(&row))
}

#[derive(Clone)]
pub struct CommentManager {
    pool: Arc<SqlitePool>,
}

impl CommentManager {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Comment on an existing post
    pub async fn create(
        &self,
        author_id: UserId,
        content_id: ContentId,
        body: &str,
    ) -> ContentResult<Comment> {
        let body = validate_body(body)?;
        let mut tx = self.pool.begin().await?;

        content_owner(&mut tx, content_id).await?;

        let result = sqlx::query("INSERT INTO comments (body, user_id, content_id) VALUES (?, ?, ?)")
            .bind(body)
            .bind(author_id)
            .bind(content_id)
            .execute(&mut *tx)
            .await?;

        let comment = fetch_comment(&mut tx, result.last_insert_rowid()).await?;
        tx.commit().await?;

        Ok(comment)
    }

    /// Comments of a post, oldest first
    pub async fn list_for(&self, content_id: ContentId) -> ContentResult<Vec<CommentView>> {
        let mut conn = self.pool.acquire().await?;
        content_owner(&mut conn, content_id).await?;

        let rows = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE content_id = ? ORDER BY created_at, id"
        ))
        .bind(content_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in &rows {
            let comment = Comment::from_row(row);
            let author = fetch_author(&mut conn, comment.user_id).await?;
            comments.push(CommentView { comment, author });
        }
        Ok(comments)
    }

    /// Edit a comment (author only)
    pub async fn update(
        &self,
        requester: UserId,
        id: CommentId,
        body: &str,
    ) -> ContentResult<Comment> {
        let body = validate_body(body)?;
        let mut tx = self.pool.begin().await?;

        let existing = fetch_comment(&mut tx, id).await?;
        if existing.user_id != requester {
            return Err(ContentError::Forbidden);
        }

        sqlx::query("UPDATE comments SET body = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(body)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let comment = fetch_comment(&mut tx, id).await?;
        tx.commit().await?;

        Ok(comment)
    }

    /// Remove a comment (author or admin)
    pub async fn delete(&self, requester: UserId, id: CommentId) -> ContentResult<()> {
        let mut tx = self.pool.begin().await?;

        let existing = fetch_comment(&mut tx, id).await?;
        if existing.user_id != requester && !is_admin(&mut tx, requester).await? {
            return Err(ContentError::Forbidden);
        }

        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
