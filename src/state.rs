use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

use crate::{
    middleware::auth::TokenKeys,
    services::{
        comment_service::CommentService, image_uploader::ImageUploader, post_service::PostService,
    },
};

/// Shared state handed to every handler. Cloning is cheap: the pool and
/// collaborators are reference counted.
#[derive(Clone)]
pub struct AppState {
    pub posts: PostService,
    pub comments: CommentService,
    pub uploader: Arc<dyn ImageUploader>,
    pub tokens: Arc<TokenKeys>,
    /// Scratch directory for incoming image parts.
    pub tmp_dir: PathBuf,
    /// Root served by `GET /media/{*key}`.
    pub media_dir: PathBuf,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        uploader: Arc<dyn ImageUploader>,
        tokens: Arc<TokenKeys>,
        tmp_dir: impl Into<PathBuf>,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            posts: PostService::new(db.clone()),
            comments: CommentService::new(db),
            uploader,
            tokens,
            tmp_dir: tmp_dir.into(),
            media_dir: media_dir.into(),
        }
    }
}
