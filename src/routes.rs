use actix_web::{web, Scope};

use crate::handlers::{health_check, recommendation_stats, recommendations_config};

/// Configure all routes for the API
pub fn api_routes() -> Scope {
    web::scope("/api")
        .service(health_check)
        .service(recommendation_stats)
        .configure(recommendations_config)
}
