//! Image upload connector.
//!
//! Handlers hand over a local file path and a destination folder and get a
//! public URL back. `CloudinaryUploader` pushes to Cloudinary with an
//! unsigned upload preset; `DiskUploader` keeps images under a local media
//! directory that `GET /media/{*key}` serves.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::config::CloudinaryConfig;

const MAX_MEDIA_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid upload folder `{0}`")]
    InvalidFolder(String),
    #[error("invalid media key")]
    InvalidKey,
    #[error("image host rejected upload with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("image host response carried no url")]
    MissingUrl,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Where an uploaded image can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub url: String,
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Upload the file at `path` into `folder` and return its public URL.
    async fn upload(&self, path: &Path, folder: &str) -> Result<UploadedImage, UploadError>;
}

/// Folder names become path segments on disk and on the remote host.
fn ensure_folder_safe(folder: &str) -> Result<(), UploadError> {
    let valid = !folder.is_empty()
        && folder
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(UploadError::InvalidFolder(folder.to_string()))
    }
}

/// Resolve a media key (`posts/ab/cd/<file>`) beneath `media_dir`.
///
/// Rejects keys that are empty, absolute, contain `..` or control bytes.
pub fn media_path(media_dir: &Path, key: &str) -> Result<PathBuf, UploadError> {
    if key.is_empty() || key.len() > MAX_MEDIA_KEY_LEN {
        return Err(UploadError::InvalidKey);
    }
    if key.starts_with('/') || key.contains("..") {
        return Err(UploadError::InvalidKey);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(UploadError::InvalidKey);
    }
    Ok(media_dir.join(key))
}

/// Stores images on local disk, sharded two levels deep.
#[derive(Debug, Clone)]
pub struct DiskUploader {
    media_dir: PathBuf,
    public_url: String,
}

impl DiskUploader {
    pub fn new(media_dir: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            media_dir: media_dir.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Two shard directories taken from MD5(folder/name), as lowercase hex.
    fn shards(folder: &str, name: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", folder, name));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }
}

#[async_trait]
impl ImageUploader for DiskUploader {
    async fn upload(&self, path: &Path, folder: &str) -> Result<UploadedImage, UploadError> {
        ensure_folder_safe(folder)?;

        let name = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.bytes().all(|b| b.is_ascii_alphanumeric()) => {
                format!("{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase())
            }
            _ => Uuid::new_v4().to_string(),
        };
        let (shard_a, shard_b) = Self::shards(folder, &name);
        let key = format!("{}/{}/{}/{}", folder, shard_a, shard_b, name);

        let target = self.media_dir.join(&key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(path, &target).await?;
        debug!("stored image {} at {}", path.display(), target.display());

        Ok(UploadedImage {
            url: format!("{}/media/{}", self.public_url, key),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CloudinaryResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

/// Unsigned uploads to the Cloudinary image API.
#[derive(Debug, Clone)]
pub struct CloudinaryUploader {
    client: reqwest::Client,
    endpoint: String,
    upload_preset: String,
}

impl CloudinaryUploader {
    pub fn new(client: reqwest::Client, cfg: &CloudinaryConfig) -> Self {
        Self {
            client,
            endpoint: format!(
                "https://api.cloudinary.com/v1_1/{}/image/upload",
                cfg.cloud_name
            ),
            upload_preset: cfg.upload_preset.clone(),
        }
    }
}

#[async_trait]
impl ImageUploader for CloudinaryUploader {
    async fn upload(&self, path: &Path, folder: &str) -> Result<UploadedImage, UploadError> {
        ensure_folder_safe(folder)?;

        let bytes = fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", folder.to_string());

        let resp = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CloudinaryResponse = resp.json().await?;
        parsed
            .secure_url
            .or(parsed.url)
            .map(|url| UploadedImage { url })
            .ok_or(UploadError::MissingUrl)
    }
}
