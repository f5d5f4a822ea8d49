//! Tavily web search provider

use super::{SearchError, SearchHit, SearchService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

pub struct TavilyService {
    client: Client,
    api_key: String,
    endpoint: String,
    max_results: u32,
}

impl TavilyService {
    pub fn new(api_key: impl Into<String>, max_results: u32) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SearchError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: TAVILY_ENDPOINT.to_string(),
            max_results: max_results.max(1),
        })
    }

    fn normalize_response(resp: TavilyResponse) -> Vec<SearchHit> {
        resp.results
            .into_iter()
            .map(|r| SearchHit::new(r.url.trim(), r.content.trim()))
            .collect()
    }
}

#[async_trait]
impl SearchService for TavilyService {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let request = TavilyRequest {
            query,
            max_results: self.max_results,
            search_depth: "basic",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout(HTTP_TIMEOUT.as_millis())
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: TavilyResponse =
            serde_json::from_str(&body).map_err(|e| SearchError::Decode(e.to_string()))?;

        Ok(Self::normalize_response(parsed))
    }

    fn provider(&self) -> &str {
        "tavily"
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}
