//! API Module
//!
//! HTTP handlers and routing for the proxy and administration API.
//!
//! # Endpoints
//! - `GET /fetch/*path` - Cached read-through fetch from the origin
//! - `POST /preload` - Schedule a background warm-up
//! - `POST /invalidate` - Remove keys containing a pattern
//! - `DELETE /clear` - Remove every cached entry
//! - `GET /stats` - Cache, pool and preloader statistics
//! - `GET /pool/stats` - Worker pool statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
