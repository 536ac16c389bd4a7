//! API Routes
//!
//! Configures the Axum router with the proxy and administration endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, fetch_handler, health_handler, invalidate_handler, pool_stats_handler,
    preload_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /fetch/*path` - Cached read-through fetch from the origin
/// - `POST /preload` - Schedule a background warm-up
/// - `POST /invalidate` - Remove keys containing a pattern
/// - `DELETE /clear` - Remove every cached entry
/// - `GET /stats` - Cache, pool and preloader statistics
/// - `GET /pool/stats` - Worker pool statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/fetch/*path", get(fetch_handler))
        .route("/preload", post(preload_handler))
        .route("/invalidate", post(invalidate_handler))
        .route("/clear", delete(clear_handler))
        .route("/stats", get(stats_handler))
        .route("/pool/stats", get(pool_stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
