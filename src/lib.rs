//! Flight Cache - an in-process request cache
//!
//! TTL caching with least-used eviction, single-flight fetch deduplication,
//! a bounded worker pool with retries, and a priority preloader, plus an
//! HTTP front end exposing them as a read-through proxy.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod flight;
pub mod models;
pub mod origin;
pub mod pool;
pub mod preload;
pub mod retry;
pub mod service;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::FetchError;
pub use origin::{HttpOrigin, Origin};
pub use retry::{with_retry, RetryPolicy};
pub use service::RequestCache;
pub use tasks::spawn_maintenance_task;
