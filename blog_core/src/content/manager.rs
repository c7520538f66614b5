//! Post manager: CRUD plus tag and file associations.

use chrono::Utc;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::sync::Arc;

use super::{
    ensure_owner_or_admin, fetch_author, insert_content_file, is_admin, next_file_order,
    errors::{ContentError, ContentResult},
    models::{
        AttachedFile, CommentView, Comment, Content, ContentDetail, ContentId, ContentPage,
        ContentStatus, ContentSummary, ContentUpdate, DeletionSummary, FileId, FileRecord,
        NewContent, Tag, TagId,
    },
};
use crate::auth::{UserId, normalize_page};

const CONTENT_COLUMNS: &str = "id, title, body, brief_introduction, user_id, cover_image, status, \
                               view_count, created_at, updated_at, published_at";

/// Post manager
#[derive(Clone)]
pub struct ContentManager {
    pool: Arc<SqlitePool>,
}

impl ContentManager {
    /// Create a new content manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Create a post owned by `author_id`
    ///
    /// `published_at` is stamped when the post starts out published.
    pub async fn create(&self, author_id: UserId, new: NewContent) -> ContentResult<Content> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(ContentError::Validation("Title is required".to_string()));
        }

        let published_at =
            (new.status == ContentStatus::Published).then(|| Utc::now().naive_utc());

        let result = sqlx::query(
            r#"
            INSERT INTO contents (title, body, brief_introduction, user_id, cover_image, status, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(title)
        .bind(&new.body)
        .bind(&new.brief_introduction)
        .bind(author_id)
        .bind(&new.cover_image)
        .bind(new.status.as_str())
        .bind(published_at)
        .execute(self.pool.as_ref())
        .await?;

        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: ContentId) -> ContentResult<Content> {
        let mut conn = self.pool.acquire().await?;
        fetch_content(&mut conn, id).await
    }

    /// Post with author, tags, comments and files in display order
    pub async fn detail(&self, id: ContentId) -> ContentResult<ContentDetail> {
        let mut conn = self.pool.acquire().await?;
        let content = fetch_content(&mut conn, id).await?;
        let author = fetch_author(&mut conn, content.user_id).await?;
        let tags = fetch_tags(&mut conn, id).await?;
        let files = fetch_files(&mut conn, id).await?;

        let rows = sqlx::query(
            "SELECT id, body, user_id, content_id, created_at, updated_at
             FROM comments WHERE content_id = ? ORDER BY created_at, id",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in &rows {
            let comment = Comment::from_row(row);
            let author = fetch_author(&mut conn, comment.user_id).await?;
            comments.push(CommentView { comment, author });
        }

        Ok(ContentDetail {
            content,
            author,
            tags,
            comments,
            files,
        })
    }

    /// Count one view
    pub async fn record_view(&self, id: ContentId) -> ContentResult<()> {
        let result = sqlx::query("UPDATE contents SET view_count = view_count + 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(ContentError::ContentNotFound(id));
        }
        Ok(())
    }

    /// Newest posts first, with author and tags
    pub async fn list(&self, page: u32, page_size: u32) -> ContentResult<ContentPage> {
        let (page, page_size) = normalize_page(page, page_size);
        let offset = i64::from(page - 1) * i64::from(page_size);
        let mut conn = self.pool.acquire().await?;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM contents")
            .fetch_one(&mut *conn)
            .await?
            .get("total");

        let rows = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let content = Content::from_row(row);
            let author = fetch_author(&mut conn, content.user_id).await?;
            let tags = fetch_tags(&mut conn, content.id).await?;
            items.push(ContentSummary {
                content,
                author,
                tags,
            });
        }

        Ok(ContentPage {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Change a post (author only)
    pub async fn update(
        &self,
        requester: UserId,
        id: ContentId,
        update: ContentUpdate,
    ) -> ContentResult<Content> {
        if let Some(title) = update.title.as_deref()
            && title.trim().is_empty()
        {
            return Err(ContentError::Validation("Title cannot be empty".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let existing = fetch_content(&mut tx, id).await?;
        if existing.user_id != requester {
            return Err(ContentError::Forbidden);
        }

        sqlx::query(
            r#"
            UPDATE contents
            SET title              = COALESCE(?, title),
                body               = COALESCE(?, body),
                brief_introduction = COALESCE(?, brief_introduction),
                cover_image        = COALESCE(?, cover_image),
                status             = COALESCE(?, status),
                published_at       = CASE
                                         WHEN ? = 'published' AND published_at IS NULL
                                         THEN CURRENT_TIMESTAMP
                                         ELSE published_at
                                     END,
                updated_at         = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(update.title.as_deref().map(str::trim))
        .bind(update.body.as_deref())
        .bind(update.brief_introduction.as_deref())
        .bind(update.cover_image.as_deref())
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.status.map(|s| s.as_str()))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let content = fetch_content(&mut tx, id).await?;
        tx.commit().await?;

        Ok(content)
    }

    /// Delete a post with its tag links, file links and comments
    ///
    /// Allowed for the author and for admins. Runs as one transaction: if
    /// any step fails nothing is removed.
    pub async fn delete(&self, requester: UserId, id: ContentId) -> ContentResult<DeletionSummary> {
        let mut tx = self.pool.begin().await?;

        ensure_owner_or_admin(&mut tx, id, requester).await?;

        let tags_removed = sqlx::query("DELETE FROM content_tags WHERE content_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let files_removed = sqlx::query("DELETE FROM content_files WHERE content_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let comments_removed = sqlx::query("DELETE FROM comments WHERE content_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM contents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        log::info!(
            "Content {} deleted by user {} ({} tags, {} files, {} comments)",
            id,
            requester,
            tags_removed,
            files_removed,
            comments_removed
        );

        Ok(DeletionSummary {
            tags_removed,
            files_removed,
            comments_removed,
        })
    }

    /// Link tags to a post, all or nothing
    ///
    /// Already linked tags are skipped. A missing tag aborts the whole
    /// batch. Returns the ids that were newly linked, in input order.
    pub async fn attach_tags(
        &self,
        requester: UserId,
        content_id: ContentId,
        tag_ids: &[TagId],
    ) -> ContentResult<Vec<TagId>> {
        let mut tx = self.pool.begin().await?;

        ensure_owner_or_admin(&mut tx, content_id, requester).await?;

        let mut attached = Vec::new();
        for &tag_id in tag_ids {
            let linked = sqlx::query("SELECT 1 FROM content_tags WHERE content_id = ? AND tag_id = ?")
                .bind(content_id)
                .bind(tag_id)
                .fetch_optional(&mut *tx)
                .await?;
            if linked.is_some() {
                continue;
            }

            let tag = sqlx::query("SELECT id FROM tags WHERE id = ?")
                .bind(tag_id)
                .fetch_optional(&mut *tx)
                .await?;
            if tag.is_none() {
                return Err(ContentError::TagNotFound(tag_id));
            }

            sqlx::query("INSERT INTO content_tags (content_id, tag_id) VALUES (?, ?)")
                .bind(content_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
            attached.push(tag_id);
        }

        tx.commit().await?;
        Ok(attached)
    }

    pub async fn detach_tag(
        &self,
        requester: UserId,
        content_id: ContentId,
        tag_id: TagId,
    ) -> ContentResult<()> {
        let mut tx = self.pool.begin().await?;

        ensure_owner_or_admin(&mut tx, content_id, requester).await?;

        let result = sqlx::query("DELETE FROM content_tags WHERE content_id = ? AND tag_id = ?")
            .bind(content_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ContentError::AssociationNotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn tags_for(&self, content_id: ContentId) -> ContentResult<Vec<Tag>> {
        let mut conn = self.pool.acquire().await?;
        fetch_content(&mut conn, content_id).await?;
        fetch_tags(&mut conn, content_id).await
    }

    /// Append files to a post's file list, all or nothing
    ///
    /// Positions continue after the current maximum (an empty list counts
    /// as -1) in the order the ids are given. A missing file, or one that
    /// is already attached, aborts the batch.
    pub async fn attach_files(
        &self,
        requester: UserId,
        content_id: ContentId,
        file_ids: &[FileId],
        usage: &str,
    ) -> ContentResult<Vec<AttachedFile>> {
        let mut tx = self.pool.begin().await?;

        ensure_owner_or_admin(&mut tx, content_id, requester).await?;

        let first = next_file_order(&mut tx, content_id).await?;
        let mut attached = Vec::with_capacity(file_ids.len());

        for (offset, &file_id) in file_ids.iter().enumerate() {
            let file = fetch_file(&mut tx, file_id).await?;

            let linked = sqlx::query("SELECT 1 FROM content_files WHERE content_id = ? AND file_id = ?")
                .bind(content_id)
                .bind(file_id)
                .fetch_optional(&mut *tx)
                .await?;
            if linked.is_some() {
                return Err(ContentError::FileAlreadyAttached(file_id));
            }

            let order = first + offset as i64;
            insert_content_file(&mut tx, content_id, file_id, order, usage).await?;
            attached.push(AttachedFile {
                content_id,
                order,
                usage: usage.to_string(),
                file,
            });
        }

        tx.commit().await?;
        Ok(attached)
    }

    pub async fn detach_file(
        &self,
        requester: UserId,
        content_id: ContentId,
        file_id: FileId,
    ) -> ContentResult<()> {
        let mut tx = self.pool.begin().await?;

        ensure_owner_or_admin(&mut tx, content_id, requester).await?;

        let result = sqlx::query("DELETE FROM content_files WHERE content_id = ? AND file_id = ?")
            .bind(content_id)
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ContentError::AssociationNotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Files of a post ordered by position
    pub async fn files_for(&self, content_id: ContentId) -> ContentResult<Vec<AttachedFile>> {
        let mut conn = self.pool.acquire().await?;
        fetch_content(&mut conn, content_id).await?;
        fetch_files(&mut conn, content_id).await
    }

    /// Whether `requester` may manage `content_id`
    pub async fn can_manage(&self, requester: UserId, content_id: ContentId) -> ContentResult<bool> {
        let mut conn = self.pool.acquire().await?;
        let owner = fetch_content(&mut conn, content_id).await?.user_id;
        Ok(owner == requester || is_admin(&mut conn, requester).await?)
    }
}

async fn fetch_content(conn: &mut SqliteConnection, id: ContentId) -> ContentResult<Content> {
    let row = sqlx::query(&format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ContentError::ContentNotFound(id))?;

    Ok(Content::from_row(&row))
}

async fn fetch_tags(conn: &mut SqliteConnection, content_id: ContentId) -> ContentResult<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.alias, t.description, t.is_active, t.display_order,
               t.created_at, t.updated_at
        FROM tags t
        JOIN content_tags ct ON ct.tag_id = t.id
        WHERE ct.content_id = ?
        ORDER BY t.display_order, t.id
        "#,
    )
    .bind(content_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(Tag::from_row).collect())
}

pub(crate) async fn fetch_file(conn: &mut SqliteConnection, id: FileId) -> ContentResult<FileRecord> {
    let row = sqlx::query(
        r#"
        SELECT id, original_name, storage_name, file_path, file_url, file_size, file_type,
               uploaded_by, status, uploaded_at
        FROM file_records WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ContentError::FileNotFound(id))?;

    Ok(FileRecord::from_row(&row))
}

async fn fetch_files(
    conn: &mut SqliteConnection,
    content_id: ContentId,
) -> ContentResult<Vec<AttachedFile>> {
    let rows = sqlx::query(
        r#"
        SELECT f.id, f.original_name, f.storage_name, f.file_path, f.file_url, f.file_size,
               f.file_type, f.uploaded_by, f.status, f.uploaded_at,
               cf.content_id, cf.sort_order, cf.usage
        FROM content_files cf
        JOIN file_records f ON f.id = cf.file_id
        WHERE cf.content_id = ?
        ORDER BY cf.sort_order, cf.created_at
        "#,
    )
    .bind(content_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|r| AttachedFile {
            content_id: r.get("content_id"),
            order: r.get("sort_order"),
            usage: r.get("usage"),
            file: FileRecord::from_row(r),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::NewTag;
    use crate::content::tags::TagManager;
    use crate::db::Database;

    async fn setup() -> (Database, ContentManager, UserId) {
        let db = Database::in_memory().await.unwrap();
        let author = sqlx::query("INSERT INTO users (username, password_hash) VALUES ('alice', 'x')")
            .execute(db.pool())
            .await
            .unwrap()
            .last_insert_rowid();
        let manager = ContentManager::new(Arc::new(db.pool().clone()));
        (db, manager, author)
    }

    fn post(title: &str) -> NewContent {
        NewContent {
            title: title.to_string(),
            body: "body".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_db, manager, author) = setup().await;

        let content = manager.create(author, post("Hello")).await.unwrap();
        assert_eq!(content.title, "Hello");
        assert_eq!(content.status, ContentStatus::Draft);
        assert!(content.published_at.is_none());

        let fetched = manager.get(content.id).await.unwrap();
        assert_eq!(fetched, content);
    }

    #[tokio::test]
    async fn test_create_requires_title() {
        let (_db, manager, author) = setup().await;

        let result = manager.create(author, post("   ")).await;
        assert!(matches!(result, Err(ContentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_publish_sets_published_at() {
        let (_db, manager, author) = setup().await;
        let content = manager.create(author, post("Hello")).await.unwrap();

        let update = ContentUpdate {
            status: Some(ContentStatus::Published),
            ..Default::default()
        };
        let updated = manager.update(author, content.id, update).await.unwrap();

        assert_eq!(updated.status, ContentStatus::Published);
        assert!(updated.published_at.is_some());
        assert_eq!(updated.body, "body");
    }

    #[tokio::test]
    async fn test_update_by_other_user_is_forbidden() {
        let (db, manager, author) = setup().await;
        let other = sqlx::query("INSERT INTO users (username, password_hash) VALUES ('bob', 'x')")
            .execute(db.pool())
            .await
            .unwrap()
            .last_insert_rowid();
        let content = manager.create(author, post("Hello")).await.unwrap();

        let result = manager.update(other, content.id, ContentUpdate::default()).await;
        assert!(matches!(result, Err(ContentError::Forbidden)));

        let result = manager.delete(other, content.id).await;
        assert!(matches!(result, Err(ContentError::Forbidden)));
        assert!(manager.get(content.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_record_view() {
        let (_db, manager, author) = setup().await;
        let content = manager.create(author, post("Hello")).await.unwrap();

        manager.record_view(content.id).await.unwrap();
        manager.record_view(content.id).await.unwrap();

        assert_eq!(manager.get(content.id).await.unwrap().view_count, 2);
        assert!(matches!(
            manager.record_view(999).await,
            Err(ContentError::ContentNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_db, manager, author) = setup().await;
        for i in 0..3 {
            manager.create(author, post(&format!("post {i}"))).await.unwrap();
        }

        let page = manager.list(1, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].content.title, "post 2");
        assert_eq!(page.items[0].author.username, "alice");
    }

    #[tokio::test]
    async fn test_attach_tags_is_idempotent() {
        let (db, manager, author) = setup().await;
        let tags = TagManager::new(Arc::new(db.pool().clone()));
        let rust = tags.create(NewTag::named("rust")).await.unwrap();
        let content = manager.create(author, post("Hello")).await.unwrap();

        let first = manager
            .attach_tags(author, content.id, &[rust.id, rust.id])
            .await
            .unwrap();
        assert_eq!(first, vec![rust.id]);

        let second = manager.attach_tags(author, content.id, &[rust.id]).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(manager.tags_for(content.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_detach_missing_tag() {
        let (_db, manager, author) = setup().await;
        let content = manager.create(author, post("Hello")).await.unwrap();

        let result = manager.detach_tag(author, content.id, 5).await;
        assert!(matches!(result, Err(ContentError::AssociationNotFound)));
    }
}
