//! Content service clients
//!
//! The blog never stores posts itself; everything comes from a headless
//! content repository that answers paginated type queries and lookups by
//! identifier. [`ContentService`] is that seam. [`HttpContentService`] talks
//! to a Prismic-style REST API, [`FixtureContentService`] serves records
//! from a local JSON file.

mod fixture;
mod http;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ContentConfig;
use crate::content::{QueryResponse, RawRecord};

pub use fixture::FixtureContentService;
pub use http::HttpContentService;

/// Errors returned by a content service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("content service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("content service returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("malformed content service response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("content service is not configured: {0}")]
    NotConfigured(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// A paginated document repository
#[async_trait]
pub trait ContentService: Send + Sync {
    /// First page of documents of one type, projected to `fetch` fields
    async fn query_by_type(
        &self,
        document_type: &str,
        fetch: &[String],
        page_size: usize,
    ) -> Result<QueryResponse>;

    /// The page a cursor from a previous response points at
    async fn fetch_page(&self, cursor: &str) -> Result<QueryResponse>;

    /// A single document by its unique identifier
    async fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<Option<RawRecord>>;
}

#[async_trait]
impl<S: ContentService + ?Sized> ContentService for Arc<S> {
    async fn query_by_type(
        &self,
        document_type: &str,
        fetch: &[String],
        page_size: usize,
    ) -> Result<QueryResponse> {
        (**self).query_by_type(document_type, fetch, page_size).await
    }

    async fn fetch_page(&self, cursor: &str) -> Result<QueryResponse> {
        (**self).fetch_page(cursor).await
    }

    async fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<Option<RawRecord>> {
        (**self).get_by_uid(document_type, uid).await
    }
}

/// Build the service described by the configuration.
///
/// A `fixture` path wins over the HTTP endpoint; relative paths resolve
/// against the site directory.
pub fn from_config(
    config: &ContentConfig,
    base_dir: &std::path::Path,
) -> Result<Arc<dyn ContentService>> {
    if let Some(fixture) = &config.fixture {
        let path = base_dir.join(fixture);
        tracing::info!("Reading content from fixture {:?}", path);
        let service = FixtureContentService::load(&path, config.page_size)?;
        return Ok(Arc::new(service));
    }

    if config.endpoint.trim().is_empty() {
        return Err(ServiceError::NotConfigured(
            "set content.endpoint or content.fixture in _config.yml".to_string(),
        ));
    }

    tracing::info!("Using content service at {}", config.endpoint);
    Ok(Arc::new(HttpContentService::new(
        &config.endpoint,
        config.access_token.clone(),
        config.timeout(),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_source() {
        let config = ContentConfig::default();
        let err = from_config(&config, std::path::Path::new(".")).err().unwrap();
        assert!(matches!(err, ServiceError::NotConfigured(_)));
    }

    #[test]
    fn test_from_config_fixture() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("posts.json"), "[]").unwrap();
        let config = ContentConfig {
            fixture: Some("posts.json".to_string()),
            ..Default::default()
        };
        assert!(from_config(&config, dir.path()).is_ok());
    }

    #[test]
    fn test_transient_errors() {
        let status = ServiceError::Status {
            status: 503,
            url: "x".to_string(),
        };
        assert!(status.is_transient());
        let missing = ServiceError::Status {
            status: 404,
            url: "x".to_string(),
        };
        assert!(!missing.is_transient());
        assert!(!ServiceError::InvalidCursor("x".to_string()).is_transient());
    }
}
