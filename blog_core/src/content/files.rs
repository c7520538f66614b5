//! File uploads: blob first, then the database rows, with a compensating
//! blob delete when the database part fails.

use rand::Rng;
use sqlx::{SqliteConnection, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::blob::{BlobStore, StoredBlob};
use super::errors::{ContentError, ContentResult};
use super::manager::fetch_file;
use super::models::{FileRecord, NewUpload};
use super::{ensure_owner_or_admin, insert_content_file, next_file_order};
use crate::auth::UserId;

/// Upload size limit when none is configured (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 << 20;

/// Accepted extensions, lowercase
const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Usage recorded when an upload is attached without one
const DEFAULT_USAGE: &str = "content";

/// Lowercased extension of `name` if it is an accepted image type
fn allowed_extension(name: &str) -> ContentResult<String> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(ContentError::UnsupportedFileType(format!(
            "{name} (allowed: {})",
            ALLOWED_EXTENSIONS.join(", ")
        )))
    }
}

/// `<unix-nanos>_<6 hex>.<ext>`
fn storage_name(ext: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let suffix: u32 = rand::rng().random_range(0..0x100_0000);
    format!("{nanos}_{suffix:06x}.{ext}")
}

fn mime_for(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        _ => "image/jpeg",
    }
}

#[derive(Clone)]
pub struct FileManager {
    pool: Arc<SqlitePool>,
    blobs: Arc<dyn BlobStore>,
    max_size: u64,
}

impl FileManager {
    pub fn new(pool: Arc<SqlitePool>, blobs: Arc<dyn BlobStore>) -> Self {
        Self::with_max_size(pool, blobs, DEFAULT_MAX_UPLOAD_BYTES)
    }

    pub fn with_max_size(pool: Arc<SqlitePool>, blobs: Arc<dyn BlobStore>, max_size: u64) -> Self {
        Self {
            pool,
            blobs,
            max_size,
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Store an uploaded image and record it, optionally attaching it to a
    /// post at the end of its file list.
    ///
    /// The blob is written before the transaction opens. If the transaction
    /// fails the blob is deleted again; a failed deletion is logged and the
    /// original error returned.
    pub async fn upload(&self, uploader: UserId, upload: NewUpload) -> ContentResult<FileRecord> {
        let size = upload.bytes.len() as u64;
        if size == 0 {
            return Err(ContentError::Validation("File is empty".to_string()));
        }
        if size > self.max_size {
            return Err(ContentError::FileTooLarge {
                size,
                max: self.max_size,
            });
        }
        let ext = allowed_extension(&upload.original_name)?;

        let name = storage_name(&ext);
        let stored = self.blobs.save(&name, &upload.bytes).await?;

        match self.record_upload(uploader, &upload, &name, &ext, &stored).await {
            Ok(record) => {
                log::info!(
                    "Stored upload {} as {} ({} bytes)",
                    upload.original_name,
                    name,
                    size
                );
                Ok(record)
            }
            Err(err) => {
                log::warn!("Recording upload {} failed, removing blob: {}", name, err);
                if let Err(cleanup) = self.blobs.delete(&name).await {
                    log::error!("Failed to remove orphaned blob {}: {}", name, cleanup);
                }
                Err(err)
            }
        }
    }

    async fn record_upload(
        &self,
        uploader: UserId,
        upload: &NewUpload,
        name: &str,
        ext: &str,
        stored: &StoredBlob,
    ) -> ContentResult<FileRecord> {
        let mut tx = self.pool.begin().await?;

        let file_type = upload
            .content_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| mime_for(ext));

        let result = sqlx::query(
            r#"
            INSERT INTO file_records
                (original_name, storage_name, file_path, file_url, file_size, file_type, uploaded_by, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'active')
            "#,
        )
        .bind(&upload.original_name)
        .bind(name)
        .bind(&stored.path)
        .bind(&stored.url)
        .bind(upload.bytes.len() as i64)
        .bind(file_type)
        .bind(uploader)
        .execute(&mut *tx)
        .await?;
        let file_id = result.last_insert_rowid();

        if let Some(content_id) = upload.content_id {
            attach_upload(&mut tx, uploader, content_id, file_id, upload.usage.as_deref()).await?;
        }

        let record = fetch_file(&mut tx, file_id).await?;
        tx.commit().await?;

        Ok(record)
    }

    pub async fn get(&self, id: super::FileId) -> ContentResult<FileRecord> {
        let mut conn = self.pool.acquire().await?;
        fetch_file(&mut conn, id).await
    }

    /// All files not marked deleted, oldest first
    pub async fn list_active(&self) -> ContentResult<Vec<FileRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, original_name, storage_name, file_path, file_url, file_size, file_type,
                   uploaded_by, status, uploaded_at
            FROM file_records
            WHERE status = 'active'
            ORDER BY uploaded_at, id
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(FileRecord::from_row).collect())
    }
}

async fn attach_upload(
    conn: &mut SqliteConnection,
    uploader: UserId,
    content_id: super::ContentId,
    file_id: super::FileId,
    usage: Option<&str>,
) -> ContentResult<()> {
    ensure_owner_or_admin(conn, content_id, uploader).await?;
    let order = next_file_order(conn, content_id).await?;
    let usage = usage.filter(|u| !u.is_empty()).unwrap_or(DEFAULT_USAGE);
    insert_content_file(conn, content_id, file_id, order, usage).await
}
