use actix_web::{
    http::header::{ContentDisposition, ContentType, DispositionParam, DispositionType},
    web, HttpResponse, Responder,
};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    entities::project::{NewProjectRequest, UpdateProjectRequest},
    errors::AppError,
    rendering::RenderMode,
    use_cases::{editor::BlockEdit, filter::ProjectFilter},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct BlocksQuery {
    #[serde(default)]
    pub mode: RenderMode,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlockEditsRequest {
    pub edits: Vec<BlockEdit>,
}

#[instrument(skip(state, data))]
pub async fn create_project(
    state: web::Data<AppState>,
    data: web::Json<NewProjectRequest>,
) -> Result<impl Responder, AppError> {
    let project = state.project_handler.create_project(data.into_inner()).await?;
    Ok(HttpResponse::Created().json(project))
}

#[instrument(skip(state, query))]
pub async fn list_projects(
    state: web::Data<AppState>,
    query: web::Query<ProjectFilter>,
) -> Result<impl Responder, AppError> {
    let response = state.project_handler.search_projects(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[instrument(skip(state))]
pub async fn get_project(
    project_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let detail = state.project_handler.project_detail(&project_id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[instrument(skip(state, data))]
pub async fn update_project(
    project_id: web::Path<String>,
    state: web::Data<AppState>,
    data: web::Json<UpdateProjectRequest>,
) -> Result<impl Responder, AppError> {
    let project = state
        .project_handler
        .update_project(&project_id, data.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(project))
}

#[instrument(skip(state))]
pub async fn delete_project(
    project_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    state.project_handler.delete_project(&project_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[instrument(skip(state, query))]
pub async fn get_project_blocks(
    project_id: web::Path<String>,
    state: web::Data<AppState>,
    query: web::Query<BlocksQuery>,
) -> Result<impl Responder, AppError> {
    let view = state
        .project_handler
        .render_project_blocks(&project_id, query.mode)
        .await?;

    if query.format.as_deref() == Some("html") {
        let html = crate::rendering::to_html(&view.blocks);
        return Ok(HttpResponse::Ok().content_type(ContentType::html()).body(html));
    }

    Ok(HttpResponse::Ok().json(view))
}

#[instrument(skip(state, data))]
pub async fn apply_block_edits(
    project_id: web::Path<String>,
    state: web::Data<AppState>,
    data: web::Json<BlockEditsRequest>,
) -> Result<impl Responder, AppError> {
    let response = state
        .project_handler
        .apply_block_edits(&project_id, data.into_inner().edits)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[instrument(skip(state))]
pub async fn download_code_block(
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let (project_id, block_id) = path.into_inner();
    let download = state.project_handler.code_download(&project_id, &block_id).await?;

    Ok(HttpResponse::Ok()
        .content_type(download.content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(download.file_name)],
        })
        .body(download.body))
}
