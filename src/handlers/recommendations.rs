use crate::error::ApiError;
use crate::models::RecommendRequest;
use crate::services::pipeline::RecommendOptions;
use crate::services::RecommendationService;
use actix_web::{
    web::{self, Json},
    HttpResponse,
};

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/recommendations").route(web::post().to(get_recommendations)));
}

/// Get grounded book recommendations for a free-text query.
pub async fn get_recommendations(
    request: Json<RecommendRequest>,
    service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::InvalidInput("Query cannot be empty".to_string()));
    }

    let options = RecommendOptions {
        style: request.style.clone(),
        use_mood: request.use_mood,
        explain: request.explain,
        second_opinion: request.second_opinion,
        history: request.history.clone().unwrap_or_default(),
    };

    let result = service.recommend(&request.query, &options).await?;

    Ok(HttpResponse::Ok().json(result))
}
