//! Request DTOs for the cache API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Maximum accepted key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for scheduling a background warm-up (POST /preload)
///
/// # Fields
/// - `path`: Origin path to warm; also the cache key
/// - `priority`: Higher runs first (default 0)
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    /// Origin path / cache key
    pub path: String,
    /// Dispatch priority
    #[serde(default)]
    pub priority: i32,
}

impl ScheduleRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.path)
    }
}

/// Request body for pattern invalidation (POST /invalidate)
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Substring matched against every cached key
    pub pattern: String,
}

impl InvalidateRequest {
    /// Validates the request data
    ///
    /// An empty pattern would match every key; `DELETE /clear` exists for that.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        None
    }
}

/// Shared key validation for the proxy endpoints.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}
