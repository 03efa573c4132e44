//! API Handlers
//!
//! HTTP request handlers for each service endpoint.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{info, warn};

use super::upstream::DataUpstream;
use crate::cache::{CacheParams, CacheStats, DataKind, LocalCache, TieredDataCache};
use crate::clock::{system_clock, SharedClock};
use crate::config::Config;
use crate::error::{CacheError, Result, StoreError};
use crate::metrics::{CacheStatsSource, MetricsSnapshot, PerformanceTracker};
use crate::models::{
    DataResponse, HealthResponse, InvalidateResponse, MetricsQuery, RateLimitRequest, StoreReply,
};
use crate::ratelimit::RateLimiter;
use crate::store::{Command, HttpRemoteStore, MemoryRemoteStore, RemoteStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<TieredDataCache>,
    pub limiter: Arc<RateLimiter>,
    pub tracker: Arc<PerformanceTracker>,
    /// Loader for `/data/:kind`; None answers 503
    pub upstream: Option<DataUpstream>,
    /// Set when no remote store URL is configured; backs `/store`
    pub embedded_store: Option<Arc<MemoryRemoteStore>>,
    /// Bearer token required by `/store`
    pub store_token: Option<String>,
}

impl AppState {
    /// Creates a new AppState from configuration.
    ///
    /// Connects to the remote store when `remote_store_url` is set, otherwise
    /// runs an embedded in-memory store.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::from_config_with_clock(config, system_clock())
    }

    /// Same as [`from_config`](Self::from_config) with an injected clock.
    pub fn from_config_with_clock(config: &Config, clock: SharedClock) -> anyhow::Result<Self> {
        let (store, embedded_store) = match config.http_store() {
            Some(http) => {
                let http = HttpRemoteStore::new(http).context("failed to create store client")?;
                info!("Using remote store at {}", http.url());
                let store: Arc<dyn RemoteStore> = Arc::new(http);
                (store, None)
            }
            None => {
                info!("No REMOTE_STORE_URL set, using embedded store");
                let embedded = Arc::new(MemoryRemoteStore::with_clock(clock.clone()));
                let store: Arc<dyn RemoteStore> = embedded.clone();
                (store, Some(embedded))
            }
        };

        let upstream = match &config.data_upstream_url {
            Some(url) => Some(DataUpstream::new(
                url.clone(),
                Duration::from_millis(config.remote_store_timeout_ms),
            )?),
            None => None,
        };

        let local = Arc::new(LocalCache::with_clock(
            config.local_cache_max_entries,
            clock.clone(),
        ));
        let cache = TieredDataCache::new(local.clone(), config.tiered_cache())
            .with_shared_store(store.clone());
        let limiter =
            RateLimiter::with_clock(store, clock.clone()).with_prefix(config.rate_limit_prefix.clone());

        let stats_source: Arc<dyn CacheStatsSource> = local;
        let tracker =
            PerformanceTracker::with_clock(config.tracker(), clock).with_cache_stats(stats_source);

        Ok(Self {
            cache: Arc::new(cache),
            limiter: Arc::new(limiter),
            tracker: Arc::new(tracker),
            upstream,
            embedded_store,
            store_token: config.remote_store_token.clone(),
        })
    }
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for POST /ratelimit/check
///
/// Answers 200 when admitted and 429 when not; rate limit headers on both.
pub async fn rate_limit_handler(
    State(state): State<AppState>,
    Json(req): Json<RateLimitRequest>,
) -> Result<Response> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::Validation(error_msg));
    }

    let decision = state
        .limiter
        .allow(&req.key, req.max_requests, req.window_seconds)
        .await?;

    let status = if decision.allowed {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };
    Ok((status, decision.headers(), Json(decision)).into_response())
}

/// Handler for POST /data/:kind
///
/// The body is the parameter object; the same parameters always hit the same
/// cache entry regardless of field order.
pub async fn fetch_data_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<DataResponse>> {
    let kind: DataKind = kind.parse()?;
    let params = CacheParams::from_json(body)?;
    let upstream = state
        .upstream
        .as_ref()
        .ok_or_else(|| CacheError::Unavailable("no data upstream configured".to_string()))?;

    let data: Value = state
        .cache
        .fetch(kind, &params, || upstream.load(kind, &params))
        .await?;

    Ok(Json(DataResponse { kind, data }))
}

/// Handler for DELETE /data/:kind
pub async fn invalidate_data_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<InvalidateResponse>> {
    let kind: DataKind = kind.parse()?;
    let params = CacheParams::from_json(body)?;
    state.cache.invalidate(kind, &params).await?;

    Ok(Json(InvalidateResponse::new(kind)))
}

/// Handler for GET /metrics
pub async fn metrics_handler(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Json<MetricsSnapshot> {
    Json(state.tracker.get_metrics(query.window_ms()))
}

/// Handler for GET /metrics/*name
///
/// `name` is the route without its leading slash, e.g. `/metrics/cache/stats`.
pub async fn endpoint_metrics_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<MetricsSnapshot>> {
    let route = format!("/{}", name.trim_start_matches('/'));
    state
        .tracker
        .get_endpoint_metrics(&route, query.window_ms())
        .map(Json)
        .ok_or_else(|| CacheError::NotFound(format!("no metrics recorded for '{}'", route)))
}

/// Handler for GET /cache/stats
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.local().stats())
}

/// Handler for POST /store
///
/// Executes one wire command (`["ZCARD", "key"]`) against the embedded store.
pub async fn store_command_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(args): Json<Vec<String>>,
) -> Response {
    let Some(store) = &state.embedded_store else {
        return store_reply(StatusCode::NOT_FOUND, Err("no embedded store".to_string()));
    };

    if let Some(token) = &state.store_token {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        if presented != Some(token.as_str()) {
            warn!("Rejected store command with missing or wrong token");
            return store_reply(StatusCode::UNAUTHORIZED, Err("unauthorized".to_string()));
        }
    }

    match Command::from_args(&args).and_then(|command| store.apply(&command)) {
        Ok(result) => store_reply(StatusCode::OK, Ok(result)),
        Err(StoreError::Command(message)) => store_reply(StatusCode::BAD_REQUEST, Err(message)),
        Err(e) => store_reply(StatusCode::BAD_REQUEST, Err(e.to_string())),
    }
}

fn store_reply(status: StatusCode, outcome: std::result::Result<Value, String>) -> Response {
    let reply = match outcome {
        Ok(result) => StoreReply::Result { result },
        Err(error) => StoreReply::Error { error },
    };
    (status, Json(reply)).into_response()
}
