//! Comment handlers under `/comment`. Every route requires authentication.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use blog_core::content::{Comment, CommentId, CommentView, ContentId};
use serde::Deserialize;

use super::AppState;
use super::error::ApiError;
use super::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct NewCommentPayload {
    pub content_id: ContentId,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentBodyPayload {
    pub body: String,
}

pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<NewCommentPayload>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state
        .comments
        .create(identity.user_id, payload.content_id, &payload.body)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Comments of one post, oldest first
pub async fn list_for_content(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Path(content_id): Path<ContentId>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    Ok(Json(state.comments.list_for(content_id).await?))
}

pub async fn update_comment(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<CommentId>,
    Json(payload): Json<CommentBodyPayload>,
) -> Result<Json<Comment>, ApiError> {
    let comment = state
        .comments
        .update(identity.user_id, id, &payload.body)
        .await?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<CommentId>,
) -> Result<StatusCode, ApiError> {
    state.comments.delete(identity.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
