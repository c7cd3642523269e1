use actix_web::{get, web, HttpResponse};
use serde_json::json;

use crate::config::StoreBackend;
use crate::state::AppState;

/// GET /health
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let backend = match state.config.store_backend {
        StoreBackend::Postgres => "postgres",
        StoreBackend::Memory => "memory",
    };
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "conversation-service",
        "store": backend,
    }))
}
