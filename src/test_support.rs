//! Test fixtures: an in-memory app wired to a recording uploader.

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{
    middleware::auth::TokenKeys,
    routes::routes::routes,
    services::{
        image_uploader::{ImageUploader, UploadError, UploadedImage},
        memory_pool,
    },
    state::AppState,
};

pub const BOUNDARY: &str = "postboard-test-boundary";

/// Uploader that records what it was asked to upload.
///
/// Uploads whose zero-based call index is listed in `fail_on` error out.
#[derive(Default)]
pub struct RecordingUploader {
    pub calls: Mutex<Vec<(PathBuf, String)>>,
    pub fail_on: Vec<usize>,
}

#[async_trait]
impl ImageUploader for RecordingUploader {
    async fn upload(&self, path: &Path, folder: &str) -> Result<UploadedImage, UploadError> {
        // the temp file must still exist while it is being uploaded
        let size = tokio::fs::metadata(path).await?.len();
        let mut calls = self.calls.lock().unwrap();
        let index = calls.len();
        calls.push((path.to_path_buf(), folder.to_string()));
        if self.fail_on.contains(&index) {
            return Err(UploadError::Rejected {
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(UploadedImage {
            url: format!("https://img.test/{}/{}-{}", folder, index, size),
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub uploader: Arc<RecordingUploader>,
    pub scratch: TempDir,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_uploader(RecordingUploader::default()).await
    }

    pub async fn with_uploader(uploader: RecordingUploader) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let uploader = Arc::new(uploader);
        let state = AppState::new(
            memory_pool().await,
            uploader.clone(),
            Arc::new(TokenKeys::new(b"test-secret", 3600)),
            scratch.path().join("tmp"),
            scratch.path().join("media"),
        );
        let router = routes().with_state(state.clone());
        Self {
            state,
            uploader,
            scratch,
            router,
        }
    }

    pub fn token(&self, user_id: &str) -> String {
        self.state.tokens.issue(user_id).unwrap()
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Bytes) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        json: Option<serde_json::Value>,
    ) -> (StatusCode, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let body = match json {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    /// Send a multipart create request with `images` of the given sizes.
    pub async fn create_post(
        &self,
        user: Option<&str>,
        body: &str,
        image_sizes: &[usize],
    ) -> (StatusCode, Bytes) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/post/create")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(user) = user {
            builder = builder.header(header::COOKIE, format!("accessToken={}", self.token(user)));
        }
        let req = builder
            .body(Body::from(multipart_body(body, image_sizes)))
            .unwrap();
        self.send(req).await
    }

    /// Files left behind in the temp upload directory.
    pub fn tmp_files(&self) -> usize {
        match std::fs::read_dir(self.scratch.path().join("tmp")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.state.posts.db)
            .await
            .unwrap()
    }
}

pub fn multipart_body(body: &str, image_sizes: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"body\"\r\n\r\n{body}\r\n",
            b = BOUNDARY
        )
        .as_bytes(),
    );
    for (i, size) in image_sizes.iter().enumerate() {
        out.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"img{i}.png\"\r\nContent-Type: image/png\r\n\r\n",
                b = BOUNDARY
            )
            .as_bytes(),
        );
        out.extend(std::iter::repeat_n(b'x', *size));
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    out
}

pub fn json<T: serde::de::DeserializeOwned>(bytes: &Bytes) -> T {
    serde_json::from_slice(bytes).unwrap()
}
