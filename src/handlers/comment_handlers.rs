//! HTTP handlers for comments.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    errors::AppError,
    middleware::auth::AuthUser,
    models::comment::{Comment, CommentBody, NewComment},
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub comment: Comment,
}

/// POST `/api/post/comment/{postId}` — comment on an existing post.
pub async fn create_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CommentBody>,
) -> Result<Json<CommentResponse>, AppError> {
    let comment = state
        .comments
        .create_comment(NewComment {
            post: post_id,
            body: payload.body,
            owner: auth.user_id,
        })
        .await?
        .ok_or_else(AppError::not_found)?;

    info!(comment_id = %comment.id, %post_id, "comment created");
    Ok(Json(CommentResponse { comment }))
}

/// DELETE `/api/post/comment/{commentId}` — owner only.
///
/// Someone else's comment answers 404, same as a missing one, so callers
/// cannot probe for comment ids.
pub async fn delete_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> Result<&'static str, AppError> {
    match state.comments.find_comment(comment_id).await? {
        Some(comment) if auth.owns(&comment.owner) => {}
        _ => return Err(AppError::not_found()),
    }

    if !state.comments.delete_comment(comment_id).await? {
        return Err(AppError::not_found());
    }

    info!(%comment_id, user_id = %auth.user_id, "comment deleted");
    Ok("deleted")
}

/// PUT `/api/post/comment/{commentId}` — owner only body edit.
pub async fn update_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Json(payload): Json<CommentBody>,
) -> Result<Json<CommentResponse>, AppError> {
    let comment = state
        .comments
        .find_comment(comment_id)
        .await?
        .ok_or_else(|| AppError::bad_request("comment not found"))?;
    if !auth.owns(&comment.owner) {
        return Err(AppError::forbidden());
    }

    let comment = state
        .comments
        .update_body(comment_id, &payload.body)
        .await?
        .ok_or_else(|| AppError::bad_request("comment not found"))?;
    Ok(Json(CommentResponse { comment }))
}

/// POST `/api/post/comment/like/{commentId}` — toggle the caller's like.
pub async fn like_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<CommentResponse>, AppError> {
    let comment = state
        .comments
        .toggle_like(comment_id, &auth.user_id)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(CommentResponse { comment }))
}
