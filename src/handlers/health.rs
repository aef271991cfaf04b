use crate::models::HealthResponse;
use crate::services::RecommendationService;
use actix_web::{get, web, HttpResponse, Responder};

#[get("/health")]
pub async fn health_check(service: web::Data<RecommendationService>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        indexed_books: service.indexed_books(),
    })
}
