//! Tag handlers under `/tag`. Reads are public.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use blog_core::content::{NewTag, Tag, TagId, TagUpdate, TagWithCount};

use super::AppState;
use super::error::ApiError;
use super::middleware::AuthUser;

/// All tags with the number of posts carrying each
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagWithCount>>, ApiError> {
    Ok(Json(state.tags.list().await?))
}

pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<TagId>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.tags.get(id).await?))
}

pub async fn create_tag(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(new): Json<NewTag>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    let tag = state.tags.create(new).await?;
    tracing::info!(user_id = identity.user_id, tag_id = tag.id, name = %tag.name, "Tag created");
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn update_tag(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<TagId>,
    Json(update): Json<TagUpdate>,
) -> Result<Json<Tag>, ApiError> {
    let tag = state.tags.update(id, update).await?;
    tracing::info!(user_id = identity.user_id, tag_id = id, "Tag updated");
    Ok(Json(tag))
}

/// Remove a tag and its links to posts
pub async fn delete_tag(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<TagId>,
) -> Result<StatusCode, ApiError> {
    state.tags.delete(id).await?;
    tracing::info!(user_id = identity.user_id, tag_id = id, "Tag deleted");
    Ok(StatusCode::NO_CONTENT)
}
