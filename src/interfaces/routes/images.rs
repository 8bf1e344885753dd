use actix_web::web;

use crate::handlers::images;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/images")
            .service(
                web::resource("")
                    .route(web::post().to(images::upload_image))
            )
    );
}

/// Serves stored uploads back at the public image base URL.
pub fn config_upload_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/uploads/{key:.*}")
            .route(web::get().to(images::serve_image))
    );
}
