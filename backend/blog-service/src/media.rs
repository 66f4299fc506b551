//! Image blob storage for post attachments.
//!
//! Blobs are opaque to the rest of the service and addressed by a relative
//! path such as `posts/<uuid>.png`; posts store only that path.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

const POSTS_DIR: &str = "posts";

/// Raw upload as received from a form or API payload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(filename: Option<String>, bytes: Vec<u8>) -> Self {
        Self { filename, bytes }
    }

    /// Check the payload decodes as an image and return its file extension.
    pub fn validate(&self, max_bytes: usize) -> Result<&'static str> {
        if self.bytes.is_empty() {
            return Err(AppError::invalid("image", "The submitted file is empty."));
        }
        if self.bytes.len() > max_bytes {
            return Err(AppError::invalid(
                "image",
                format!("Image is larger than {} bytes.", max_bytes),
            ));
        }

        let not_an_image = || {
            AppError::invalid(
                "image",
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            )
        };
        let format = image::guess_format(&self.bytes).map_err(|_| not_an_image())?;
        image::load_from_memory_with_format(&self.bytes, format).map_err(|_| not_an_image())?;

        format
            .extensions_str()
            .first()
            .copied()
            .ok_or_else(not_an_image)
    }
}

#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Persist a validated image and return its storage path.
    async fn save(&self, bytes: &[u8], extension: &str) -> Result<String>;

    /// Remove a blob; a missing blob is not an error.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Stores blobs under a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(AppError::Media(format!("refusing unsafe media path '{}'", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn save(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let path = format!("{}/{}.{}", POSTS_DIR, Uuid::new_v4(), extension);
        let target = self.resolve(&path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Media(e.to_string()))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| AppError::Media(e.to_string()))?;

        debug!(%path, size = bytes.len(), "Stored image");
        Ok(path)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Media(e.to_string())),
        }
    }
}
