mod catalog;
mod invites;

pub use catalog::*;
pub use invites::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(rate_limit: RateLimitConfig) -> Router<AppState> {
    let strict = Router::new().route("/invites/accept", post(accept_invite));

    let standard = Router::new()
        .route("/invites/validate", post(validate_invite))
        .route("/catalog/categories", get(list_public_categories))
        .route("/catalog/services", get(list_public_services))
        .route("/catalog/packages", get(list_public_packages))
        .route("/settings", get(get_site_settings));

    Router::new()
        .route("/health", get(health))
        .merge(rate_limit::limit(strict, rate_limit.strict_rpm))
        .merge(rate_limit::limit(standard, rate_limit.standard_rpm))
}
