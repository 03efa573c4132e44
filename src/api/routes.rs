//! API Routes
//!
//! Configures the Axum router with all service endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_stats_handler, endpoint_metrics_handler, fetch_data_handler, health_handler,
    invalidate_data_handler, metrics_handler, rate_limit_handler, store_command_handler, AppState,
};
use super::middleware::track_requests;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `POST /ratelimit/check` - Sliding window admission check
/// - `POST /data/:kind` - Cached upstream query
/// - `DELETE /data/:kind` - Invalidate a cached query
/// - `GET /metrics` - Aggregates over all requests
/// - `GET /metrics/*name` - Aggregates for one route
/// - `GET /cache/stats` - Local cache statistics
/// - `POST /store` - Embedded store commands (embedded store only)
///
/// # Middleware
/// - Timing: Records each routed request in the performance tracker
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router: Router<AppState> = Router::new()
        .route("/health", get(health_handler))
        .route("/ratelimit/check", post(rate_limit_handler))
        .route(
            "/data/:kind",
            post(fetch_data_handler).delete(invalidate_data_handler),
        )
        .route("/metrics", get(metrics_handler))
        .route("/metrics/*name", get(endpoint_metrics_handler))
        .route("/cache/stats", get(cache_stats_handler));

    if state.embedded_store.is_some() {
        router = router.route("/store", post(store_command_handler));
    }

    router
        .route_layer(middleware::from_fn_with_state(
            state.tracker.clone(),
            track_requests,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
