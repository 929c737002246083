//! HTTP handlers for posts: create with images, list, fetch, edit, delete
//! and like toggling.

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    errors::AppError,
    handlers::uploads::{TOO_MANY_IMAGES, TempUploads, read_post_form},
    middleware::auth::AuthUser,
    models::post::{MAX_POST_IMAGES, NewPost, Post, PostPatch},
    state::AppState,
};

/// Remote folder that post images are uploaded into.
pub const POST_IMAGE_FOLDER: &str = "posts";

#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub post: Post,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
}

/// POST `/api/post/create` — multipart `body` plus up to five `images`.
///
/// Image limits are checked while the form is read. Temp files are removed
/// on every path out of this handler.
pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PostResponse>, AppError> {
    let form = read_post_form(multipart, &state.tmp_dir).await?;

    let result = publish_post(&state, form.body, &auth.user_id, &form.images).await;
    form.images.discard().await;
    let post = result?;

    info!(post_id = %post.id, user_id = %auth.user_id, images = post.images.len(), "post created");
    Ok(Json(PostResponse { post }))
}

/// Upload images one at a time, keeping order, then persist the post.
///
/// An image the host refuses is skipped; the post is still created.
async fn publish_post(
    state: &AppState,
    body: String,
    owner: &str,
    images: &TempUploads,
) -> Result<Post, AppError> {
    let mut urls = Vec::with_capacity(images.len());
    for image in images.iter() {
        match state.uploader.upload(&image.path, POST_IMAGE_FOLDER).await {
            Ok(uploaded) => urls.push(uploaded.url),
            Err(err) => warn!("skipping image {:?}: {}", image.file_name, err),
        }
    }

    let post = state
        .posts
        .create_post(NewPost {
            body,
            owner: owner.to_string(),
            images: urls,
        })
        .await?;
    Ok(post)
}

/// GET `/api/post/` — every post, no paging.
pub async fn get_posts(State(state): State<AppState>) -> Result<Json<PostsResponse>, AppError> {
    let posts = state.posts.list_posts().await?;
    Ok(Json(PostsResponse { posts }))
}

/// GET `/api/post/{postId}`
pub async fn get_post_by_id(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostResponse>, AppError> {
    let post = state
        .posts
        .find_post(post_id)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(PostResponse { post }))
}

/// DELETE `/api/post/{postId}` — owner only.
///
/// A post that does not exist fails the ownership check and answers 403.
pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<&'static str, AppError> {
    let post = state.posts.find_post(post_id).await?;
    if !post.is_some_and(|p| auth.owns(&p.owner)) {
        return Err(AppError::forbidden());
    }

    if !state.posts.delete_post(post_id).await? {
        return Err(AppError::not_found());
    }

    info!(%post_id, user_id = %auth.user_id, "post deleted");
    Ok("deleted")
}

/// PUT `/api/post/{postId}` — owner only partial update.
pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(patch): Json<PostPatch>,
) -> Result<Json<PostResponse>, AppError> {
    let post = state.posts.find_post(post_id).await?;
    if !post.is_some_and(|p| auth.owns(&p.owner)) {
        return Err(AppError::forbidden());
    }

    if patch
        .images
        .as_ref()
        .is_some_and(|images| images.len() > MAX_POST_IMAGES)
    {
        return Err(AppError::bad_request(TOO_MANY_IMAGES));
    }

    let post = state
        .posts
        .update_post(post_id, patch)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(PostResponse { post }))
}

/// POST `/api/post/like/{postId}` — like if not yet liked, unlike otherwise.
pub async fn like_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostResponse>, AppError> {
    let post = state
        .posts
        .toggle_like(post_id, &auth.user_id)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(PostResponse { post }))
}
