//! Content, tag, comment and file data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::str::FromStr;

use super::errors::ContentError;
use crate::auth::UserId;

pub type ContentId = i64;
pub type TagId = i64;
pub type CommentId = i64;
pub type FileId = i64;

/// Publication state of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl ContentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
            ContentStatus::Archived => "archived",
        }
    }
}

impl FromStr for ContentStatus {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContentStatus::Draft),
            "published" => Ok(ContentStatus::Published),
            "archived" => Ok(ContentStatus::Archived),
            other => Err(ContentError::Validation(format!("Unknown status: {other}"))),
        }
    }
}

/// A post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    pub title: String,
    pub body: String,
    pub brief_introduction: String,
    pub user_id: UserId,
    pub cover_image: String,
    pub status: ContentStatus,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Content {
    pub(crate) fn from_row(r: &SqliteRow) -> Self {
        Self {
            id: r.get("id"),
            title: r.get("title"),
            body: r.get("body"),
            brief_introduction: r.get("brief_introduction"),
            user_id: r.get("user_id"),
            cover_image: r.get("cover_image"),
            // The CHECK constraint keeps the column inside the known set
            status: r.get::<String, _>("status").parse().unwrap_or_default(),
            view_count: r.get("view_count"),
            created_at: r.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: r.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
            published_at: r
                .get::<Option<chrono::NaiveDateTime>, _>("published_at")
                .map(|dt| dt.and_utc()),
        }
    }
}

/// Public part of a user shown next to posts and comments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub username: String,
    pub avatar: String,
}

/// Post as shown in listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSummary {
    #[serde(flatten)]
    pub content: Content,
    pub author: Author,
    pub tags: Vec<Tag>,
}

/// Post with everything attached to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDetail {
    #[serde(flatten)]
    pub content: Content,
    pub author: Author,
    pub tags: Vec<Tag>,
    pub comments: Vec<CommentView>,
    pub files: Vec<AttachedFile>,
}

/// One page of the post listing, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPage {
    pub items: Vec<ContentSummary>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// New post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContent {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub brief_introduction: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub status: ContentStatus,
}

/// Fields to change on a post; `None` keeps the current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub brief_introduction: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub status: Option<ContentStatus>,
}

/// Dependent rows removed together with a post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSummary {
    pub tags_removed: u64,
    pub files_removed: u64,
    pub comments_removed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub alias: String,
    pub description: String,
    pub is_active: bool,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    pub(crate) fn from_row(r: &SqliteRow) -> Self {
        Self {
            id: r.get("id"),
            name: r.get("name"),
            alias: r.get("alias"),
            description: r.get("description"),
            is_active: r.get("is_active"),
            display_order: r.get("display_order"),
            created_at: r.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: r.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTag {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub display_order: i64,
}

impl NewTag {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: String::new(),
            description: String::new(),
            is_active: true,
            display_order: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub display_order: Option<i64>,
}

/// Tag together with the number of posts carrying it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub article_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub body: String,
    pub user_id: UserId,
    pub content_id: ContentId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub(crate) fn from_row(r: &SqliteRow) -> Self {
        Self {
            id: r.get("id"),
            body: r.get("body"),
            user_id: r.get("user_id"),
            content_id: r.get("content_id"),
            created_at: r.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: r.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        }
    }
}

/// Comment with its author
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Author,
}

/// Metadata of an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub original_name: String,
    pub storage_name: String,
    pub file_path: String,
    pub file_url: String,
    pub file_size: i64,
    pub file_type: String,
    pub uploaded_by: Option<UserId>,
    pub status: String,
    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    pub(crate) fn from_row(r: &SqliteRow) -> Self {
        Self {
            id: r.get("id"),
            original_name: r.get("original_name"),
            storage_name: r.get("storage_name"),
            file_path: r.get("file_path"),
            file_url: r.get("file_url"),
            file_size: r.get("file_size"),
            file_type: r.get("file_type"),
            uploaded_by: r.get("uploaded_by"),
            status: r.get("status"),
            uploaded_at: r.get::<chrono::NaiveDateTime, _>("uploaded_at").and_utc(),
        }
    }
}

/// File attached to a post at a position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachedFile {
    pub content_id: ContentId,
    pub order: i64,
    pub usage: String,
    pub file: FileRecord,
}

/// Incoming upload
#[derive(Debug, Clone, Default)]
pub struct NewUpload {
    pub original_name: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// Attach to this post right away
    pub content_id: Option<ContentId>,
    pub usage: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ContentStatus::Draft,
            ContentStatus::Published,
            ContentStatus::Archived,
        ] {
            assert_eq!(status.as_str().parse::<ContentStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<ContentStatus>().is_err());
    }

    #[test]
    fn test_new_tag_defaults_from_json() {
        let tag: NewTag = serde_json::from_str(r#"{"name":"rust"}"#).unwrap();
        assert!(tag.is_active);
        assert_eq!(tag.display_order, 0);
    }

    #[test]
    fn test_content_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ContentStatus::Published).unwrap(),
            "\"published\""
        );
    }
}
