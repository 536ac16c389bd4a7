//! API Handlers
//!
//! HTTP request handlers for the proxy and administration endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    validate_key, ClearResponse, FetchResponse, HealthResponse, InvalidateRequest,
    InvalidateResponse, ScheduleRequest, ScheduleResponse, StatsResponse,
};
use crate::origin::Origin;
use crate::pool::PoolStats;
use crate::service::RequestCache;

type Result<T> = std::result::Result<T, ApiError>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache, pool and preloader
    pub cache: RequestCache<String>,
    /// Where misses are fetched from
    pub origin: Arc<dyn Origin>,
    /// TTL applied to proxied and preloaded values
    pub default_ttl: Duration,
}

impl AppState {
    /// Creates a new AppState from its parts.
    pub fn new(cache: RequestCache<String>, origin: Arc<dyn Origin>, default_ttl: Duration) -> Self {
        Self {
            cache,
            origin,
            default_ttl,
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config, origin: Arc<dyn Origin>) -> Self {
        Self::new(RequestCache::new(config), origin, config.default_ttl())
    }
}

/// Handler for GET /fetch/*path
///
/// Returns the cached value for `path`, fetching it from the origin through
/// the pool with retries on a miss.
pub async fn fetch_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<FetchResponse>> {
    if let Some(error_msg) = validate_key(&path) {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let origin = Arc::clone(&state.origin);
    let origin_path = path.clone();
    let value = state
        .cache
        .fetch(
            &path,
            move || {
                let origin = Arc::clone(&origin);
                let origin_path = origin_path.clone();
                async move { origin.fetch(&origin_path).await }
            },
            state.default_ttl,
        )
        .await?;

    Ok(Json(FetchResponse::new(path, value)))
}

/// Handler for POST /preload
///
/// Schedules a background warm-up of a path.
pub async fn preload_handler(
    State(state): State<AppState>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let origin = Arc::clone(&state.origin);
    let origin_path = req.path.clone();
    let scheduled = state
        .cache
        .schedule(
            &req.path,
            move || async move { origin.fetch(&origin_path).await },
            req.priority,
        )
        .await;

    Ok(Json(ScheduleResponse {
        key: req.path,
        scheduled,
    }))
}

/// Handler for POST /invalidate
///
/// Removes every cached key containing the pattern.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let removed = state.cache.invalidate(&req.pattern).await;

    Ok(Json(InvalidateResponse {
        pattern: req.pattern,
        removed,
    }))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.cache.clear().await;
    Json(ClearResponse { removed })
}

/// Handler for GET /stats
///
/// Returns cache, pool and preloader statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        cache: state.cache.stats().await,
        pool: state.cache.pool_stats(),
        preload: state.cache.preload_stats().await,
    })
}

/// Handler for GET /pool/stats
pub async fn pool_stats_handler(State(state): State<AppState>) -> Json<PoolStats> {
    Json(state.cache.pool_stats())
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
