use actix_web::web;

use crate::handlers::projects;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/projects")
            .service(
                web::resource("")
                    .route(web::post().to(projects::create_project))
                    .route(web::get().to(projects::list_projects))
            )
            .service(
                web::resource("/{project_id}")
                    .route(web::get().to(projects::get_project))
                    .route(web::patch().to(projects::update_project))
                    .route(web::delete().to(projects::delete_project))
            )
            .service(
                web::resource("/{project_id}/blocks")
                    .route(web::get().to(projects::get_project_blocks))
            )
            .service(
                web::resource("/{project_id}/blocks/edits")
                    .route(web::post().to(projects::apply_block_edits))
            )
            .service(
                web::resource("/{project_id}/blocks/{block_id}/download")
                    .route(web::get().to(projects::download_code_block))
            )
    );
}
