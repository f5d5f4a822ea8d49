//! Trait abstractions for runtime I/O
//!
//! Stages only see these traits, so the whole pipeline can be driven by mocks.

use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::search::{SearchError, SearchHit, SearchService};
use async_trait::async_trait;
use std::sync::Arc;

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete an LLM request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Client for web search
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run one query. An empty result is not an error.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: SearchClient + ?Sized> SearchClient for Arc<T> {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        (**self).search(query).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use an `LlmService` as `LlmClient`
#[derive(Clone)]
pub struct ServiceLlmClient {
    service: Arc<dyn LlmService>,
}

impl ServiceLlmClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LlmClient for ServiceLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.service.complete(request).await
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}

/// Adapter to use a `SearchService` as `SearchClient`
#[derive(Clone)]
pub struct ServiceSearchClient {
    service: Arc<dyn SearchService>,
}

impl ServiceSearchClient {
    pub fn new(service: Arc<dyn SearchService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl SearchClient for ServiceSearchClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        self.service.search(query).await
    }
}
