use crate::models::StatsResponse;
use crate::services::RecommendationService;
use actix_web::{get, web, HttpResponse, Responder};

/// Per-title recommendation counts for the analytics surface.
#[get("/stats")]
pub async fn recommendation_stats(service: web::Data<RecommendationService>) -> impl Responder {
    HttpResponse::Ok().json(StatsResponse {
        recommendation_counts: service.recommendation_stats(),
    })
}
