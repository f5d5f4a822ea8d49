//! Service configuration
//!
//! `PipelineConfig` holds the policy constants every turn reads; it is built
//! once at startup and shared read-only. `AppConfig` adds collaborator
//! endpoints and credentials, read from the process environment.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_MAX_PLAN_SIZE: usize = 5;
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_SEARCH_RESULTS: u32 = 5;
pub const DEFAULT_LLM_BASE_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama3.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_SESSIONS: usize = 1_000;
pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TAVILY_API_KEY is not set; the search collaborator cannot authenticate")]
    MissingSearchKey,
    #[error("LLM_API_KEY is required for remote LLM endpoint {0}")]
    MissingLlmKey(String),
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

/// Policy constants for the answer pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Fact-check failures that may send control back to the synthesizer
    pub max_retries: u32,
    /// Upper bound on planner sub-queries (at least 1)
    pub max_plan_size: usize,
    /// Unsupported claims tolerated on a passing verdict
    pub unsupported_claim_tolerance: usize,
    pub llm_timeout: Duration,
    pub search_timeout: Duration,
    /// Run the LLM bias audit even when the lexical screen finds nothing
    pub neutralizer_audit: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_plan_size: DEFAULT_MAX_PLAN_SIZE,
            unsupported_claim_tolerance: 0,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            neutralizer_audit: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_plan_size(mut self, max_plan_size: usize) -> Self {
        self.max_plan_size = max_plan_size.max(1);
        self
    }

    pub fn with_tolerance(mut self, tolerance: usize) -> Self {
        self.unsupported_claim_tolerance = tolerance;
        self
    }

    pub fn with_neutralizer_audit(mut self, enabled: bool) -> Self {
        self.neutralizer_audit = enabled;
        self
    }
}

/// Bounds on server-side sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Sessions kept at once; idle ones are evicted oldest first
    pub max_sessions: usize,
    /// Sessions untouched for longer than this are dropped
    pub idle_ttl: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_ttl: DEFAULT_SESSION_IDLE_TTL,
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub search_max_results: u32,
    pub pipeline: PipelineConfig,
    pub sessions: SessionLimits,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            max_retries: parse_or(&get, "POLINTEL_MAX_RETRIES", defaults.max_retries)?,
            max_plan_size: parse_or(&get, "POLINTEL_MAX_PLAN_SIZE", defaults.max_plan_size)?
                .max(1),
            unsupported_claim_tolerance: parse_or(
                &get,
                "POLINTEL_CLAIM_TOLERANCE",
                defaults.unsupported_claim_tolerance,
            )?,
            llm_timeout: Duration::from_secs(parse_or(
                &get,
                "POLINTEL_LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )?),
            search_timeout: Duration::from_secs(parse_or(
                &get,
                "POLINTEL_SEARCH_TIMEOUT_SECS",
                defaults.search_timeout.as_secs(),
            )?),
            neutralizer_audit: parse_or(
                &get,
                "POLINTEL_NEUTRALIZER_AUDIT",
                defaults.neutralizer_audit,
            )?,
        };

        let sessions = SessionLimits {
            max_sessions: parse_or(&get, "POLINTEL_MAX_SESSIONS", DEFAULT_MAX_SESSIONS)?.max(1),
            idle_ttl: Duration::from_secs(parse_or(
                &get,
                "POLINTEL_SESSION_TTL_SECS",
                DEFAULT_SESSION_IDLE_TTL.as_secs(),
            )?),
        };

        Ok(Self {
            port: parse_or(&get, "POLINTEL_PORT", DEFAULT_PORT)?,
            llm_base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            llm_api_key: get("LLM_API_KEY"),
            tavily_api_key: get("TAVILY_API_KEY"),
            search_max_results: parse_or(
                &get,
                "POLINTEL_SEARCH_RESULTS",
                DEFAULT_SEARCH_RESULTS,
            )?,
            pipeline,
            sessions,
        })
    }

    /// Startup precondition: every collaborator must be able to authenticate
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tavily_api_key.is_none() {
            return Err(ConfigError::MissingSearchKey);
        }
        if self.llm_api_key.is_none() && !is_local_endpoint(&self.llm_base_url) {
            return Err(ConfigError::MissingLlmKey(self.llm_base_url.clone()));
        }
        Ok(())
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

/// Local model servers (Ollama, llama.cpp) run without credentials
fn is_local_endpoint(url: &str) -> bool {
    Url::parse(url.trim()).ok().is_some_and(|parsed| {
        matches!(
            parsed.host_str(),
            Some("localhost" | "127.0.0.1" | "0.0.0.0" | "[::1]" | "host.docker.internal")
        )
    })
}
