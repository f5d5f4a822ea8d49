//! Web search provider abstraction
//!
//! The search collaborator maps a query string to a list of documents. An
//! empty list is a valid answer; only transport and decoding problems are errors.

mod tavily;

pub use tavily::TavilyService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// A single search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub snippet: String,
}

impl SearchHit {
    pub fn new(url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("search timed out after {0} ms")]
    Timeout(u128),
    #[error("search provider unreachable: {0}")]
    Network(String),
    #[error("search provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("search response could not be decoded: {0}")]
    Decode(String),
}

/// Common interface for search providers
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;

    /// Provider name, for logs
    fn provider(&self) -> &str;
}

/// Logging wrapper for search services
pub struct LoggingSearch {
    inner: Arc<dyn SearchService>,
}

impl LoggingSearch {
    pub fn new(inner: Arc<dyn SearchService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SearchService for LoggingSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let start = std::time::Instant::now();
        let result = self.inner.search(query).await;
        let duration = start.elapsed();

        match &result {
            Ok(hits) => tracing::info!(
                provider = self.inner.provider(),
                query,
                results = hits.len(),
                duration_ms = %duration.as_millis(),
                "Search completed"
            ),
            Err(e) => tracing::warn!(
                provider = self.inner.provider(),
                query,
                error = %e,
                duration_ms = %duration.as_millis(),
                "Search failed"
            ),
        }

        result
    }

    fn provider(&self) -> &str {
        self.inner.provider()
    }
}
