use chrono::Utc;
use validator::Validate;

use crate::{
    entities::image::{storage_key, ImageUploadRequest, UploadedImage},
    errors::AppError,
    repositories::image_store::ImageStore,
    utils::image_file::inspect_image,
};

pub struct ImageHandler<S>
where
    S: ImageStore,
{
    pub image_store: S,
    pub max_upload_bytes: usize,
}

impl<S> ImageHandler<S>
where
    S: ImageStore,
{
    pub fn new(image_store: S, max_upload_bytes: usize) -> Self {
        ImageHandler { image_store, max_upload_bytes }
    }

    /// Stores an uploaded image under a timestamped, sanitized name
    pub async fn upload_image(&self, request: ImageUploadRequest) -> Result<UploadedImage, AppError> {
        request.validate()?;

        let content_type = inspect_image(&request.file_data, self.max_upload_bytes)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;

        let now = Utc::now();
        let key = storage_key(&request.file_name, now);
        let stored = self.image_store.upload(&key, &request.file_data).await?;

        tracing::info!(reference = %stored.reference, content_type, "Image uploaded");

        Ok(UploadedImage {
            url: stored.url,
            reference: stored.reference,
            content_type: content_type.to_string(),
            size_bytes: request.file_data.len() as u64,
            uploaded_at: now,
        })
    }

    /// Stored bytes and their sniffed content type
    pub async fn fetch_image(&self, key: &str) -> Result<(Vec<u8>, &'static str), AppError> {
        let bytes = self
            .image_store
            .fetch(key)
            .await?
            .ok_or_else(|| AppError::NotFound { resource: "image", id: key.to_string() })?;

        let content_type = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("application/octet-stream");
        Ok((bytes, content_type))
    }
}
