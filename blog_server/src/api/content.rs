//! Post handlers under `/content`.
//!
//! Reads go through the optional gate so that the response can tell the
//! viewer whether they wrote the post. Writes require authentication.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use blog_core::auth::Identity;
use blog_core::content::{
    AttachedFile, Content, ContentDetail, ContentId, ContentSummary, ContentUpdate,
    DeletionSummary, FileId, NewContent, TagId,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use super::auth::PageQuery;
use super::error::ApiError;
use super::middleware::{AuthUser, MaybeUser};

/// A post as seen by a particular viewer
#[derive(Debug, Serialize)]
pub struct ViewerContent<T> {
    #[serde(flatten)]
    pub item: T,
    pub is_author: bool,
}

#[derive(Debug, Serialize)]
pub struct ContentListResponse {
    pub items: Vec<ViewerContent<ContentSummary>>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct AttachTagsPayload {
    pub tag_ids: Vec<TagId>,
}

#[derive(Debug, Serialize)]
pub struct AttachTagsResponse {
    /// Tags that were not linked before
    pub attached: Vec<TagId>,
}

#[derive(Debug, Deserialize)]
pub struct AttachFilesPayload {
    pub file_ids: Vec<FileId>,
    #[serde(default)]
    pub usage: String,
}

fn is_author(viewer: &Option<Identity>, author_id: i64) -> bool {
    viewer.as_ref().is_some_and(|v| v.user_id == author_id)
}

/// Newest posts first
pub async fn list_contents(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<ContentListResponse>, ApiError> {
    let (page, page_size) = query.resolve();
    let listing = state.contents.list(page, page_size).await?;

    let items = listing
        .items
        .into_iter()
        .map(|summary| ViewerContent {
            is_author: is_author(&viewer, summary.content.user_id),
            item: summary,
        })
        .collect();

    Ok(Json(ContentListResponse {
        items,
        total: listing.total,
        page: listing.page,
        page_size: listing.page_size,
    }))
}

/// One post with tags, comments and files.
///
/// The view is counted after loading, so the response shows the count
/// before this request.
pub async fn get_content(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<ContentId>,
) -> Result<Json<ViewerContent<ContentDetail>>, ApiError> {
    let detail = state.contents.detail(id).await?;
    state.contents.record_view(id).await?;

    Ok(Json(ViewerContent {
        is_author: is_author(&viewer, detail.content.user_id),
        item: detail,
    }))
}

pub async fn create_content(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(new): Json<NewContent>,
) -> Result<(StatusCode, Json<Content>), ApiError> {
    let content = state.contents.create(identity.user_id, new).await?;
    Ok((StatusCode::CREATED, Json(content)))
}

/// Change a post (author only)
pub async fn update_content(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ContentId>,
    Json(update): Json<ContentUpdate>,
) -> Result<Json<Content>, ApiError> {
    let content = state.contents.update(identity.user_id, id, update).await?;
    Ok(Json(content))
}

/// Delete a post with everything hanging off it (author or admin)
pub async fn delete_content(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ContentId>,
) -> Result<Json<DeletionSummary>, ApiError> {
    let summary = state.contents.delete(identity.user_id, id).await?;
    Ok(Json(summary))
}

pub async fn attach_tags(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ContentId>,
    Json(payload): Json<AttachTagsPayload>,
) -> Result<Json<AttachTagsResponse>, ApiError> {
    let attached = state
        .contents
        .attach_tags(identity.user_id, id, &payload.tag_ids)
        .await?;
    Ok(Json(AttachTagsResponse { attached }))
}

pub async fn detach_tag(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path((id, tag_id)): Path<(ContentId, TagId)>,
) -> Result<StatusCode, ApiError> {
    state.contents.detach_tag(identity.user_id, id, tag_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Append files to the post's file list, in the given order
pub async fn attach_files(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ContentId>,
    Json(payload): Json<AttachFilesPayload>,
) -> Result<Json<Vec<AttachedFile>>, ApiError> {
    let attached = state
        .contents
        .attach_files(identity.user_id, id, &payload.file_ids, &payload.usage)
        .await?;
    Ok(Json(attached))
}

pub async fn detach_file(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path((id, file_id)): Path<(ContentId, FileId)>,
) -> Result<StatusCode, ApiError> {
    state
        .contents
        .detach_file(identity.user_id, id, file_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
