use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;

use crate::{
    entities::image::resolve_image_url,
    errors::{AppError, StoreError},
};

/// Where an uploaded blob ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredImage {
    pub url: String,
    pub reference: String,
}

/// Blob storage for uploaded images.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores `bytes` under `key` (a relative path such as
    /// `images/<millis>_<name>`).
    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<StoredImage, AppError>;

    /// Bytes stored under `key`, or `None` when nothing is there.
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, AppError>;

    /// Public URL for a stored reference. Absolute URLs are returned as is.
    fn public_url(&self, reference: &str) -> String;
}

#[async_trait]
impl<S> ImageStore for Arc<S>
where
    S: ImageStore + ?Sized,
{
    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<StoredImage, AppError> {
        (**self).upload(key, bytes).await
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        (**self).fetch(key).await
    }

    fn public_url(&self, reference: &str) -> String {
        (**self).public_url(reference)
    }
}

/// Writes uploads below a directory served at `base_url`.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    base_url: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        LocalImageStore {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub async fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await.map_err(StoreError::Io)?;
        tracing::info!("Image store initialized at: {:?}", self.root);
        Ok(())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = key.trim_start_matches('/');
        if relative.is_empty() || relative.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(AppError::InvalidInput(format!("Invalid storage key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<StoredImage, AppError> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a temp file first so readers never see a partial image.
        // The suffix keeps the full name so `a.png` and `a.jpg` never share it.
        let mut temp_name = path.clone().into_os_string();
        temp_name.push(".part");
        let temp_path = PathBuf::from(temp_name);

        let written = match fs::write(&temp_path, bytes).await {
            Ok(()) => fs::rename(&temp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                tracing::warn!(key, error = %cleanup, "Could not remove partial upload");
            }
            return Err(AppError::from(e));
        }

        tracing::debug!(key, size = bytes.len(), "Stored image");

        Ok(StoredImage {
            url: self.public_url(key),
            reference: key.to_string(),
        })
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::from(e)),
        }
    }

    fn public_url(&self, reference: &str) -> String {
        resolve_image_url(reference, &self.base_url)
    }
}
