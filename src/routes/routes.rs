//! Defines routes for posts, comments and likes.
//!
//! ## Structure
//! - **Public**
//!   - `GET    /api/post/`                         — list posts
//!   - `GET    /api/post/{postId}`                 — fetch one post
//!   - `GET    /media/{*key}`                      — locally stored images
//!   - `GET    /healthz`, `GET /readyz`            — probes
//!
//! - **Authenticated** (handlers take [`AuthUser`](crate::middleware::auth::AuthUser))
//!   - `POST   /api/post/create`                   — multipart post with images
//!   - `POST   /api/post/like/{postId}`            — toggle post like
//!   - `POST   /api/post/comment/{postId}`         — add comment
//!   - `POST   /api/post/comment/like/{commentId}` — toggle comment like
//!   - `PUT    /api/post/{postId}`                 — edit post
//!   - `PUT    /api/post/comment/{commentId}`      — edit comment
//!   - `DELETE /api/post/{postId}`                 — delete post
//!   - `DELETE /api/post/comment/{commentId}`      — delete comment
//!
//! `/api/post/comment/{id}` carries a post id for POST and a comment id for
//! PUT/DELETE; one path segment cannot have two parameter names.

use crate::{
    handlers::{
        comment_handlers::{create_comment, delete_comment, like_comment, update_comment},
        health_handlers::{healthz, readyz},
        media_handlers::get_media,
        post_handlers::{
            create_post, delete_post, get_post_by_id, get_posts, like_post, update_post,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Request body cap for post creation, well above five 1 MB images. Image
/// limits are enforced while the form streams in; a request that still hits
/// this cap is answered 400 by the multipart reader.
pub const CREATE_POST_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Build and return the router for every endpoint.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/media/{*key}", get(get_media))
        .route("/api/post", get(get_posts))
        .route("/api/post/", get(get_posts))
        .route(
            "/api/post/create",
            post(create_post).layer(DefaultBodyLimit::max(CREATE_POST_BODY_LIMIT)),
        )
        .route("/api/post/like/{post_id}", post(like_post))
        .route("/api/post/comment/like/{comment_id}", post(like_comment))
        .route(
            "/api/post/comment/{id}",
            post(create_comment)
                .put(update_comment)
                .delete(delete_comment),
        )
        .route(
            "/api/post/{post_id}",
            get(get_post_by_id).put(update_post).delete(delete_post),
        )
}

#[cfg(test)]
mod tests {
    use crate::test_support::TestApp;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn probes_report_ok() {
        let app = TestApp::new().await;
        let (status, _) = app.call("GET", "/healthz", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, bytes) = app.call("GET", "/readyz", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
        assert_eq!(body["checks"]["disk"]["ok"], true);
        assert_eq!(app.tmp_files(), 0);
    }

    #[tokio::test]
    async fn list_is_reachable_with_and_without_trailing_slash() {
        let app = TestApp::new().await;
        for uri in ["/api/post", "/api/post/"] {
            let (status, bytes) = app.call("GET", uri, None, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(&bytes[..], br#"{"posts":[]}"#);
        }
    }

    #[tokio::test]
    async fn media_is_served_from_media_dir() {
        let app = TestApp::new().await;
        let dir = app.state.media_dir.join("posts/aa/bb");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("pic.png"), b"png").unwrap();

        let (status, bytes) = app
            .call("GET", "/media/posts/aa/bb/pic.png", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&bytes[..], b"png");

        let (status, _) = app
            .call("GET", "/media/posts/aa/bb/missing.png", None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .call("GET", "/media/posts/../../secret.png", None, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
