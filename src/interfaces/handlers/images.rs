use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{entities::image::ImageUploadRequest, errors::AppError, AppState};

#[derive(Debug, MultipartForm)]
pub struct ImageUploadForm {
    #[multipart(rename = "file")]
    pub file: TempFile,
}

#[instrument(skip(state, form))]
pub async fn upload_image(
    state: web::Data<AppState>,
    form: MultipartForm<ImageUploadForm>,
) -> Result<impl Responder, AppError> {
    let form = form.into_inner();
    let file_name = form
        .file
        .file_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "upload".to_string());

    let file_data = tokio::fs::read(form.file.file.path()).await?;

    let uploaded = state
        .image_handler
        .upload_image(ImageUploadRequest { file_data, file_name })
        .await?;

    Ok(HttpResponse::Created().json(uploaded))
}

#[instrument(skip(state))]
pub async fn serve_image(
    key: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let (bytes, content_type) = state.image_handler.fetch_image(&key).await?;
    Ok(HttpResponse::Ok().content_type(content_type).body(bytes))
}
