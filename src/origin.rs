//! Origin Module
//!
//! The backing service that cached values come from.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{FetchError, Result};

// == Origin Trait ==
/// Source of values for cache misses.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Fetches the resource at `path`.
    async fn fetch(&self, path: &str) -> Result<String>;
}

// == HTTP Origin ==
/// Origin reached over HTTP: `GET {base_url}/{path}`, body returned as text.
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrigin {
    /// Creates an origin rooted at `base_url`.
    pub fn new(base_url: impl Into<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Full URL for `path`.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, path: &str) -> Result<String> {
        let url = self.url_for(path);
        debug!(url = %url, "fetching from origin");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| FetchError::origin(format!("Origin request failed: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::origin(format!(
                "Origin returned {} for {}",
                status, path
            )));
        }

        response
            .text()
            .await
            .map_err(|err| FetchError::origin(format!("Origin body unreadable: {}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};

    async fn spawn_origin() -> String {
        let app = Router::new()
            .route("/packs", get(|| async { "pack list" }))
            .route(
                "/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "nope") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_url_for_joins_slashes() {
        let origin = HttpOrigin::new("http://example.test/api/").unwrap();
        assert_eq!(origin.url_for("/packs"), "http://example.test/api/packs");
        assert_eq!(origin.url_for("packs/1"), "http://example.test/api/packs/1");
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let origin = HttpOrigin::new(spawn_origin().await).unwrap();
        assert_eq!(origin.fetch("packs").await, Ok("pack list".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let origin = HttpOrigin::new(spawn_origin().await).unwrap();
        let err = origin.fetch("broken").await.unwrap_err();
        assert!(err.to_string().contains("500"), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn test_fetch_unreachable() {
        // Reserve a port, then free it so nothing is listening there
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let origin = HttpOrigin::new(format!("http://{}", addr)).unwrap();
        assert!(matches!(
            origin.fetch("anything").await,
            Err(FetchError::Origin(_))
        ));
    }
}
