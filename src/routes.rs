use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};

/// Form payloads are a handful of short strings.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Per-IP request budget for the public API.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub per_second: u64,
    pub burst_size: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            per_second: 10,
            burst_size: 20,
        }
    }
}

/// Builds the application router.
///
/// `/health` always bypasses rate limiting. Pass `None` for `rate_limit` when
/// the caller cannot provide peer addresses (e.g. in-process tests).
pub fn build_router(
    state: Arc<AppState>,
    rate_limit: Option<RateLimit>,
) -> anyhow::Result<Router> {
    let mut api_routes = Router::new()
        .route("/api/v1/leads", post(handlers::submit_lead))
        .route("/api/v1/enrollments", post(handlers::submit_enrollment))
        .route("/api/v1/utm", get(handlers::capture_utm))
        .route("/api/v1/events/cta", post(handlers::track_cta))
        .route("/api/v1/cta/sticky", get(handlers::sticky_cta_status))
        .route(
            "/api/v1/cta/sticky/dismiss",
            post(handlers::dismiss_sticky_cta),
        )
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)));

    if let Some(limit) = rate_limit {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(limit.per_second)
                .burst_size(limit.burst_size)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
        );
        api_routes = api_routes.layer(GovernorLayer {
            config: governor_conf,
        });
    }

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    Ok(app)
}
