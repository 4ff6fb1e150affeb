pub mod admin;
pub mod auth;
pub mod portal;
pub mod public;
pub mod team;
pub mod webhooks;

use axum::{Router, middleware};

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::middleware::{require_admin, session_auth};

/// Assemble every route group. Shared by the server binary and tests.
pub fn app_router(state: AppState, rate_limit: RateLimitConfig) -> Router<AppState> {
    let session = middleware::from_fn_with_state(state.clone(), session_auth);

    let signed_in = Router::new()
        .merge(auth::session_router())
        .merge(portal::router())
        .merge(team::router())
        .layer(session.clone());

    let admin = admin::router()
        .layer(middleware::from_fn(require_admin))
        .layer(session);

    Router::new()
        .merge(public::router(rate_limit))
        .merge(auth::router(rate_limit))
        .merge(signed_in)
        .merge(admin)
        .merge(webhooks::router())
}
