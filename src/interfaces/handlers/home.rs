use actix_web::{get, HttpResponse, Responder};

#[get("/")]
pub async fn home() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Portfolio showcase API",
        "status": "Ok",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "projects": "/api/v1/projects",
            "images": "/api/v1/images",
            "health": "/api/v1/health"
        }
    }))
}
