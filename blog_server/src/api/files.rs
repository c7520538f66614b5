//! File handlers under `/file`.
//!
//! Uploads are `multipart/form-data` with a `file` part and optional
//! `content_id` and `usage` parts:
//!
//! ```bash
//! curl -X POST http://localhost:8080/file/upload \
//!   -H "Authorization: Bearer $TOKEN" \
//!   -F file=@cover.png -F content_id=3 -F usage=cover
//! ```

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use blog_core::content::{AttachedFile, ContentId, FileRecord, NewUpload};

use super::AppState;
use super::error::ApiError;
use super::middleware::AuthUser;

/// Extra request bytes allowed on top of the file itself for multipart
/// framing and the small text parts.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Store an image and optionally attach it to a post
///
/// # Errors
///
/// - `400 Bad Request`: missing file part, empty or oversized file, or not png/jpg/jpeg
/// - `403 Forbidden`: attaching to someone else's post
/// - `404 Not Found`: the post does not exist
pub async fn upload(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileRecord>), ApiError> {
    let mut upload = NewUpload::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                upload.original_name = field.file_name().unwrap_or_default().to_string();
                upload.content_type = field.content_type().map(str::to_string);
                upload.bytes = field.bytes().await?.to_vec();
                has_file = true;
            }
            "content_id" => {
                let raw = field.text().await?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    let id = raw
                        .parse::<ContentId>()
                        .map_err(|_| ApiError::validation("content_id must be an integer"))?;
                    upload.content_id = Some(id);
                }
            }
            "usage" => upload.usage = Some(field.text().await?),
            _ => {}
        }
    }

    if !has_file {
        return Err(ApiError::validation("Missing file part"));
    }

    let record = state.files.upload(identity.user_id, upload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Every active file, oldest first
pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<FileRecord>>, ApiError> {
    Ok(Json(state.files.list_active().await?))
}

/// Files of one post by position
pub async fn files_for_content(
    State(state): State<AppState>,
    Path(content_id): Path<ContentId>,
) -> Result<Json<Vec<AttachedFile>>, ApiError> {
    Ok(Json(state.contents.files_for(content_id).await?))
}
