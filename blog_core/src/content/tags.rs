//! Tag manager.

use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use super::errors::{ContentError, ContentResult};
use super::models::{NewTag, Tag, TagId, TagUpdate, TagWithCount};

const TAG_COLUMNS: &str =
    "id, name, alias, description, is_active, display_order, created_at, updated_at";

fn map_name_conflict(err: sqlx::Error, name: &str) -> ContentError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return ContentError::TagNameTaken(name.to_string());
    }
    ContentError::Database(err)
}

#[derive(Clone)]
pub struct TagManager {
    pool: Arc<SqlitePool>,
}

impl TagManager {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Create a tag; names are unique
    pub async fn create(&self, new: NewTag) -> ContentResult<Tag> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(ContentError::Validation("Tag name is required".to_string()));
        }

        let result = sqlx::query(
            "INSERT INTO tags (name, alias, description, is_active, display_order) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(&new.alias)
        .bind(&new.description)
        .bind(new.is_active)
        .bind(new.display_order)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| map_name_conflict(e, name))?;

        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: TagId) -> ContentResult<Tag> {
        let row = sqlx::query(&format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(ContentError::TagNotFound(id))?;

        Ok(Tag::from_row(&row))
    }

    /// All tags with the number of posts carrying each
    pub async fn list(&self) -> ContentResult<Vec<TagWithCount>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.alias, t.description, t.is_active, t.display_order,
                   t.created_at, t.updated_at, COUNT(ct.content_id) AS article_count
            FROM tags t
            LEFT JOIN content_tags ct ON ct.tag_id = t.id
            GROUP BY t.id
            ORDER BY t.display_order, t.id
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .iter()
            .map(|r| TagWithCount {
                tag: Tag::from_row(r),
                article_count: r.get("article_count"),
            })
            .collect())
    }

    pub async fn update(&self, id: TagId, update: TagUpdate) -> ContentResult<Tag> {
        let name = update.name.as_deref().map(str::trim);
        if name.is_some_and(str::is_empty) {
            return Err(ContentError::Validation("Tag name cannot be empty".to_string()));
        }

        let result = sqlx::query(
            r#"
            UPDATE tags
            SET name          = COALESCE(?, name),
                alias         = COALESCE(?, alias),
                description   = COALESCE(?, description),
                is_active     = COALESCE(?, is_active),
                display_order = COALESCE(?, display_order),
                updated_at    = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(update.alias.as_deref())
        .bind(update.description.as_deref())
        .bind(update.is_active)
        .bind(update.display_order)
        .bind(id)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| map_name_conflict(e, name.unwrap_or_default()))?;

        if result.rows_affected() == 0 {
            return Err(ContentError::TagNotFound(id));
        }
        self.get(id).await
    }

    /// Remove a tag and its links to posts
    pub async fn delete(&self, id: TagId) -> ContentResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM content_tags WHERE tag_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ContentError::TagNotFound(id));
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> (Database, TagManager) {
        let db = Database::in_memory().await.unwrap();
        let tags = TagManager::new(Arc::new(db.pool().clone()));
        (db, tags)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_db, tags) = setup().await;
        let tag = tags.create(NewTag::named("rust")).await.unwrap();

        assert_eq!(tag.name, "rust");
        assert!(tag.is_active);
        assert_eq!(tags.get(tag.id).await.unwrap(), tag);
    }

    #[tokio::test]
    async fn test_duplicate_name() {
        let (_db, tags) = setup().await;
        tags.create(NewTag::named("rust")).await.unwrap();

        let result = tags.create(NewTag::named("rust")).await;
        assert!(matches!(result, Err(ContentError::TagNameTaken(name)) if name == "rust"));
    }

    #[tokio::test]
    async fn test_list_counts_articles() {
        let (db, tags) = setup().await;
        let rust = tags.create(NewTag::named("rust")).await.unwrap();
        tags.create(NewTag::named("go")).await.unwrap();

        let user = sqlx::query("INSERT INTO users (username, password_hash) VALUES ('a', 'x')")
            .execute(db.pool())
            .await
            .unwrap()
            .last_insert_rowid();
        for title in ["one", "two"] {
            let content = sqlx::query("INSERT INTO contents (title, user_id) VALUES (?, ?)")
                .bind(title)
                .bind(user)
                .execute(db.pool())
                .await
                .unwrap()
                .last_insert_rowid();
            sqlx::query("INSERT INTO content_tags (content_id, tag_id) VALUES (?, ?)")
                .bind(content)
                .bind(rust.id)
                .execute(db.pool())
                .await
                .unwrap();
        }

        let listed = tags.list().await.unwrap();
        let counts: Vec<(String, i64)> = listed
            .into_iter()
            .map(|t| (t.tag.name, t.article_count))
            .collect();
        assert_eq!(counts, vec![("rust".to_string(), 2), ("go".to_string(), 0)]);
    }

    #[tokio::test]
    async fn test_update_partial() {
        let (_db, tags) = setup().await;
        let tag = tags.create(NewTag::named("rust")).await.unwrap();

        let update = TagUpdate {
            description: Some("systems".to_string()),
            ..Default::default()
        };
        let updated = tags.update(tag.id, update).await.unwrap();
        assert_eq!(updated.name, "rust");
        assert_eq!(updated.description, "systems");

        let missing = tags.update(999, TagUpdate::default()).await;
        assert!(matches!(missing, Err(ContentError::TagNotFound(999))));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_db, tags) = setup().await;
        let tag = tags.create(NewTag::named("rust")).await.unwrap();

        tags.delete(tag.id).await.unwrap();
        assert!(matches!(tags.get(tag.id).await, Err(ContentError::TagNotFound(_))));
        assert!(matches!(tags.delete(tag.id).await, Err(ContentError::TagNotFound(_))));
    }
}
