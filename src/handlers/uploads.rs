//! Multipart intake for post creation.
//!
//! Every `images` part is streamed to its own file under the temp
//! directory. Image limits are enforced while reading: a sixth image part or
//! a part past [`MAX_IMAGE_BYTES`] stops the read with a 400, whatever the
//! size of the rest of the request. The resulting [`TempUploads`] owns the
//! spooled files: handlers call [`TempUploads::discard`] on every
//! normal exit, and `Drop` removes whatever is left if a handler bails
//! out early.

use axum::{
    extract::{
        Multipart,
        multipart::{Field, MultipartError},
    },
    http::StatusCode,
};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{errors::AppError, models::post::MAX_POST_IMAGES};

/// Largest accepted source image, in bytes.
pub const MAX_IMAGE_BYTES: u64 = 1_000_000;

pub const TOO_MANY_IMAGES: &str = "maximum 5 images per post";
pub const IMAGE_TOO_LARGE: &str = "maximum image size is 1MB";

/// One image part written to disk.
#[derive(Debug)]
pub struct TempUpload {
    pub path: PathBuf,
    pub size: u64,
    pub file_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct TempUploads {
    files: Vec<TempUpload>,
}

impl TempUploads {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TempUpload> {
        self.files.iter()
    }

    /// Delete every temp file.
    pub async fn discard(mut self) {
        for upload in self.files.drain(..) {
            if let Err(err) = fs::remove_file(&upload.path).await {
                if err.kind() != ErrorKind::NotFound {
                    warn!("failed to remove temp upload {}: {}", upload.path.display(), err);
                }
            }
        }
    }
}

impl Drop for TempUploads {
    // Blocking removal: only reached on early exits, and the files are small.
    fn drop(&mut self) {
        for upload in &self.files {
            match std::fs::remove_file(&upload.path) {
                Ok(()) => debug!("removed leftover temp upload {}", upload.path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!(
                    "failed to remove temp upload {}: {}",
                    upload.path.display(),
                    err
                ),
            }
        }
    }
}

/// The decoded `POST /api/post/create` form.
#[derive(Debug)]
pub struct PostForm {
    pub body: String,
    pub images: TempUploads,
}

/// Read the multipart form, spooling `images` parts into `tmp_dir`.
///
/// A missing `body` part reads as an empty body. Unknown parts are skipped.
pub async fn read_post_form(mut multipart: Multipart, tmp_dir: &Path) -> Result<PostForm, AppError> {
    fs::create_dir_all(tmp_dir).await?;

    let mut body = None;
    let mut images = TempUploads::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("body") => body = Some(field.text().await.map_err(multipart_error)?),
            Some("images") => {
                if images.len() >= MAX_POST_IMAGES {
                    info!("rejected upload: more than {} images", MAX_POST_IMAGES);
                    return Err(AppError::bad_request(TOO_MANY_IMAGES));
                }
                images.files.push(spool_to_temp(field, tmp_dir).await?);
            }
            other => debug!("ignoring multipart field {:?}", other),
        }
    }

    Ok(PostForm {
        body: body.unwrap_or_default(),
        images,
    })
}

async fn spool_to_temp(mut field: Field<'_>, tmp_dir: &Path) -> Result<TempUpload, AppError> {
    let file_name = field.file_name().map(str::to_owned);
    let extension = file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric()));

    let tmp_name = match extension {
        Some(ext) => format!(".upload-{}.{}", Uuid::new_v4(), ext),
        None => format!(".upload-{}", Uuid::new_v4()),
    };
    let path = tmp_dir.join(tmp_name);
    let mut file = File::create(&path).await?;

    let mut size: u64 = 0;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) => {
                let _ = fs::remove_file(&path).await;
                return Err(multipart_error(err));
            }
        };
        size += chunk.len() as u64;
        if size > MAX_IMAGE_BYTES {
            let _ = fs::remove_file(&path).await;
            info!("rejected upload: {:?} exceeds {} bytes", file_name, MAX_IMAGE_BYTES);
            return Err(AppError::bad_request(IMAGE_TOO_LARGE));
        }
        if let Err(err) = file.write_all(&chunk).await {
            let _ = fs::remove_file(&path).await;
            return Err(err.into());
        }
    }
    if let Err(err) = file.flush().await {
        let _ = fs::remove_file(&path).await;
        return Err(err.into());
    }

    debug!("spooled {:?} ({} bytes) to {}", file_name, size, path.display());
    Ok(TempUpload {
        path,
        size,
        file_name,
    })
}

/// Malformed multipart bodies are client errors. Hitting the route's body
/// limit answers 400 as well, like the per-image limits.
fn multipart_error(err: MultipartError) -> AppError {
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => AppError::bad_request(err.body_text()),
        status => AppError::new(status, err.body_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(dir: &Path, name: &str, size: u64) -> TempUpload {
        let path = dir.join(name);
        std::fs::write(&path, vec![0u8; size as usize]).unwrap();
        TempUpload {
            path,
            size,
            file_name: Some(name.into()),
        }
    }

    #[tokio::test]
    async fn discard_removes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = TempUploads {
            files: vec![temp_file(dir.path(), "a", 3), temp_file(dir.path(), "b", 4)],
        };
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads.iter().map(|u| u.size).sum::<u64>(), 7);

        uploads.discard().await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn drop_cleans_up_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _uploads = TempUploads {
                files: vec![temp_file(dir.path(), "a", 1)],
            };
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
