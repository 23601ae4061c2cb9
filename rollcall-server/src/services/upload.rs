//! Upload intake: size ceiling, format sniffing and scoped temporary files

use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Raster formats the recognizer accepts
const ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/webp",
    "image/tiff",
];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No image uploaded in field '{0}'")]
    Missing(&'static str),

    #[error("Uploaded file is empty")]
    Empty,

    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Only image files are allowed (got {0})")]
    UnsupportedFormat(String),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Check size and sniff the format; returns the file extension to store under
pub fn validate_image(bytes: &[u8], max_bytes: usize) -> Result<&'static str, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(UploadError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    match infer::get(bytes) {
        Some(kind) if ACCEPTED_MIME_TYPES.contains(&kind.mime_type()) => Ok(kind.extension()),
        Some(kind) => Err(UploadError::UnsupportedFormat(kind.mime_type().to_string())),
        None => Err(UploadError::UnsupportedFormat("unrecognized data".to_string())),
    }
}

/// Uploaded image stored on disk for the duration of a request or task
///
/// Call [`TempUpload::cleanup`] when done; dropping without it removes the
/// file synchronously.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    removed: bool,
}

impl TempUpload {
    /// Write `bytes` to a uniquely named file in `dir`
    pub async fn persist(dir: &Path, bytes: &[u8], extension: &str) -> Result<Self, UploadError> {
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(format!("{}.{}", Uuid::new_v4(), extension));
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "Stored upload");

        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn cleanup(mut self) {
        self.removed = true;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove upload");
            }
        }
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
