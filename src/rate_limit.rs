//! Per-IP rate limiting for public endpoints.
//!
//! Tiers:
//! - Strict: /auth/sign-up, /auth/sign-in, /invites/accept (password hashing, account creation)
//! - Standard: /invites/validate, /catalog/*, /settings
//!
//! Configure via RATE_LIMIT_STRICT_RPM (default 10) and
//! RATE_LIMIT_STANDARD_RPM (default 30). A value of 0 disables the tier.
//!
//! The key extractor reads the peer address, so the server must be started
//! with `into_make_service_with_connect_info::<SocketAddr>()`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

use crate::db::AppState;

pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Build a limiter allowing `requests_per_minute` with an equal burst.
/// Returns None for a zero rate.
pub fn layer(requests_per_minute: u32) -> Option<RateLimitLayer> {
    if requests_per_minute == 0 {
        return None;
    }
    let period_secs = (60 / requests_per_minute as u64).max(1);
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(period_secs))
        .burst_size(requests_per_minute)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// Apply a limiter to `router` unless the tier is disabled.
pub fn limit(router: Router<AppState>, requests_per_minute: u32) -> Router<AppState> {
    match layer(requests_per_minute) {
        Some(limiter) => router.layer(limiter),
        None => router,
    }
}
