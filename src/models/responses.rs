//! Response DTOs for the cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::pool::PoolStats;
use crate::preload::PreloadStats;

/// Response body for a proxied fetch (GET /fetch/*path)
#[derive(Debug, Clone, Serialize)]
pub struct FetchResponse {
    /// The requested key
    pub key: String,
    /// The cached or freshly fetched value
    pub value: String,
}

impl FetchResponse {
    /// Creates a new FetchResponse
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for POST /preload
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleResponse {
    /// The key that was submitted
    pub key: String,
    /// False when the key was already cached or pending
    pub scheduled: bool,
}

/// Response body for POST /invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// The pattern that was applied
    pub pattern: String,
    /// Number of entries removed
    pub removed: usize,
}

/// Response body for DELETE /clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Number of entries removed
    pub removed: usize,
}

/// Response body for the statistics endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Cache occupancy and usage
    pub cache: CacheStats,
    /// Worker pool occupancy
    pub pool: PoolStats,
    /// Preloader counters
    pub preload: PreloadStats,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
