//! Mock implementations for testing
//!
//! These mocks drive the pipeline without network I/O. LLM responses are
//! scripted per request purpose, so each stage can be given its own answers.

use super::traits::{LlmClient, SearchClient};
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use crate::search::{SearchError, SearchHit};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses per purpose
///
/// Queued responses are used first, in order. After that the purpose's
/// default (if any) answers every further request. With neither, the call
/// fails with a network error.
#[allow(dead_code)]
pub struct MockLlmClient {
    responses: Mutex<HashMap<String, VecDeque<Result<LlmResponse, LlmError>>>>,
    defaults: Mutex<HashMap<String, String>>,
    model_id: String,
    delay: Option<Duration>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

#[allow(dead_code)]
impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            defaults: Mutex::new(HashMap::new()),
            model_id: "mock-model".to_string(),
            delay: None,
            requests: Mutex::new(Vec::new()),
            request_started: Arc::new(Notify::new()),
        }
    }

    /// Sleep this long before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful text response for one purpose
    pub fn queue_text(&self, purpose: &str, text: impl Into<String>) {
        self.queue(purpose, Ok(LlmResponse::text(text)));
    }

    /// Queue an error response for one purpose
    pub fn queue_error(&self, purpose: &str, error: LlmError) {
        self.queue(purpose, Err(error));
    }

    /// Answer every unqueued request for `purpose` with `text`
    pub fn set_default(&self, purpose: &str, text: impl Into<String>) {
        self.defaults
            .lock()
            .unwrap()
            .insert(purpose.to_string(), text.into());
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests for one purpose
    pub fn requests_for(&self, purpose: &str) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.purpose == purpose)
            .cloned()
            .collect()
    }

    fn queue(&self, purpose: &str, response: Result<LlmResponse, LlmError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(purpose.to_string())
            .or_default()
            .push_back(response);
    }

    fn next_response(&self, purpose: &str) -> Result<LlmResponse, LlmError> {
        if let Some(queued) = self
            .responses
            .lock()
            .unwrap()
            .get_mut(purpose)
            .and_then(VecDeque::pop_front)
        {
            return queued;
        }
        self.defaults
            .lock()
            .unwrap()
            .get(purpose)
            .map(|text| LlmResponse::text(text.clone()))
            .ok_or_else(|| LlmError::network("No mock response queued"))
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_response(request.purpose)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Search Client
// ============================================================================

/// Mock search client with canned results per query
///
/// Unknown queries return an empty result list.
#[allow(dead_code)]
pub struct MockSearchClient {
    outcomes: HashMap<String, Result<Vec<SearchHit>, SearchError>>,
    delays: HashMap<String, Duration>,
    /// Record of queries received
    pub queries: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockSearchClient {
    pub fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            delays: HashMap::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_results(mut self, query: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        self.outcomes.insert(query.into(), Ok(hits));
        self
    }

    pub fn with_error(mut self, query: impl Into<String>, error: SearchError) -> Self {
        self.outcomes.insert(query.into(), Err(error));
        self
    }

    pub fn with_delay(mut self, query: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(query.into(), delay);
        self
    }

    /// Get recorded queries, in arrival order
    pub fn recorded_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl Default for MockSearchClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchClient for MockSearchClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        self.outcomes
            .get(query)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, SessionLimits};
    use crate::conversation::{Speaker, StageErrorKind, Turn};
    use crate::runtime::{SessionManager, SharedRuntime, TurnError, TurnRuntime};
    use crate::stages::{fact_checker, neutralizer, planner, router, synthesizer};
    use tokio_util::sync::CancellationToken;

    const DEBT_QUERY: &str = "Arguments for and against the debt ceiling deal";
    const PRO_QUERY: &str = "debt ceiling deal arguments in favor";
    const CON_QUERY: &str = "critiques of debt ceiling deal";
    const DRAFT: &str = "Overview: the deal suspended the limit. Perspective A: supporters cite \
                         deficit reduction [1]. Perspective B: critics cite spending caps [2].";
    const SUPPORTED: &str = r#"[{"claim": "supporters cite deficit reduction", "sources": [1]},
                               {"claim": "critics cite spending caps", "sources": [2]}]"#;
    const UNSUPPORTED: &str = r#"[{"claim": "supporters cite deficit reduction", "sources": [1]},
                                 {"claim": "the vote was unanimous", "sources": []}]"#;

    fn political_llm() -> MockLlmClient {
        let llm = MockLlmClient::new();
        llm.set_default(
            router::PURPOSE,
            r#"{"category": "Fiscal Discipline vs. Default Risk", "is_political": true, "primary_entities": ["Congress"]}"#,
        );
        llm.set_default(planner::PURPOSE, format!(r#"["{PRO_QUERY}", "{CON_QUERY}"]"#));
        llm.set_default(synthesizer::PURPOSE, DRAFT);
        llm.set_default(neutralizer::PURPOSE, neutralizer::NEUTRAL_MARKER);
        llm
    }

    fn debt_search() -> MockSearchClient {
        MockSearchClient::new()
            .with_results(
                PRO_QUERY,
                vec![SearchHit::new(
                    "https://budget.example/cbo-score",
                    "CBO estimated deficit reduction of $1.5 trillion.",
                )],
            )
            .with_results(
                CON_QUERY,
                vec![SearchHit::new(
                    "https://policy.example/caps",
                    "Critics said the caps squeeze domestic programs.",
                )],
            )
    }

    fn runtime(
        llm: &Arc<MockLlmClient>,
        search: &Arc<MockSearchClient>,
        config: PipelineConfig,
    ) -> TurnRuntime<Arc<MockLlmClient>, Arc<MockSearchClient>> {
        TurnRuntime::new(config, llm.clone(), search.clone())
    }

    #[tokio::test]
    async fn test_mock_llm_client_queue_then_default() {
        let mock = MockLlmClient::new();
        mock.queue_text("router", "first");
        mock.set_default("router", "fallback");
        let request = LlmRequest::new("router", "system");

        assert_eq!(mock.complete(&request).await.unwrap().text, "first");
        assert_eq!(mock.complete(&request).await.unwrap().text, "fallback");
        assert!(mock.complete(&LlmRequest::new("planner", "s")).await.is_err());
        assert_eq!(mock.requests_for("router").len(), 2);
    }

    #[tokio::test]
    async fn test_non_political_query_is_deflected() {
        let llm = Arc::new(MockLlmClient::new());
        llm.queue_text(
            router::PURPOSE,
            r#"{"category": "non-political", "is_political": false, "primary_entities": []}"#,
        );
        let search = Arc::new(MockSearchClient::new());
        let rt = runtime(&llm, &search, PipelineConfig::default());

        let result = rt
            .run_turn("What's the weather?", vec![], CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.final_answer, router::DEFLECTION_MESSAGE);
        assert!(result.verified);
        assert!(!result.in_scope);
        assert!(result.plan.is_empty());
        assert!(result.evidence.is_empty());
        assert_eq!(llm.recorded_requests().len(), 1, "only the router runs");
        assert!(search.recorded_queries().is_empty());
        assert_eq!(result.history.len(), 2);
        assert_eq!(result.history[1].text, router::DEFLECTION_MESSAGE);
    }

    #[tokio::test]
    async fn test_debt_ceiling_query_passes_verification() {
        let llm = Arc::new(political_llm());
        llm.queue_text(fact_checker::PURPOSE, SUPPORTED);
        let search = Arc::new(debt_search());
        let rt = runtime(&llm, &search, PipelineConfig::default());

        let result = rt
            .run_turn(DEBT_QUERY, vec![], CancellationToken::new())
            .await
            .unwrap();

        assert!(result.verified);
        assert!(result.in_scope);
        assert_eq!(result.final_answer, DRAFT);
        assert!(result.final_answer.contains("Perspective A"));
        assert!(result.final_answer.contains("Perspective B"));
        assert_eq!(result.retry_count, 0);
        assert_eq!(result.plan, vec![PRO_QUERY, CON_QUERY]);
        assert_eq!(result.evidence.len(), 2);
        assert_eq!(result.evidence[0].source_query, PRO_QUERY);
        assert_eq!(result.evidence[1].source_query, CON_QUERY);
        assert!(result.errors.is_empty());
        assert!(!result.turn_id.is_empty());
    }

    #[tokio::test]
    async fn test_total_search_failure_yields_limitation_answer() {
        let llm = Arc::new(political_llm());
        llm.queue_text(fact_checker::PURPOSE, "[]");
        let search = Arc::new(
            MockSearchClient::new()
                .with_error(PRO_QUERY, SearchError::Network("down".into()))
                .with_error(CON_QUERY, SearchError::Timeout(20_000)),
        );
        let rt = runtime(&llm, &search, PipelineConfig::default());

        let result = rt
            .run_turn(DEBT_QUERY, vec![], CancellationToken::new())
            .await
            .unwrap();

        assert!(result.evidence.is_empty());
        assert!(result.final_answer.contains("could not find sufficient information"));
        assert!(result.verified, "no claims to check");
        assert!(llm.requests_for(synthesizer::PURPOSE).is_empty());
        assert_eq!(result.errors.len(), 2);
        assert!(result
            .errors
            .iter()
            .all(|e| e.kind == StageErrorKind::SearchError));
    }

    #[tokio::test]
    async fn test_persistent_failures_exhaust_retries() {
        let llm = Arc::new(political_llm());
        llm.set_default(fact_checker::PURPOSE, UNSUPPORTED);
        let search = Arc::new(debt_search());
        let rt = runtime(&llm, &search, PipelineConfig::default().with_max_retries(2));

        let result = rt
            .run_turn(DEBT_QUERY, vec![], CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.verified);
        assert_eq!(result.retry_count, 2);
        assert_eq!(result.final_answer, DRAFT, "best available neutralized answer");
        assert_eq!(result.unsupported_claims, vec!["the vote was unanimous"]);
        assert_eq!(llm.requests_for(synthesizer::PURPOSE).len(), 3);
        assert_eq!(llm.requests_for(fact_checker::PURPOSE).len(), 3);
        // Retries reuse the plan and evidence
        assert_eq!(llm.requests_for(planner::PURPOSE).len(), 1);
        assert_eq!(search.recorded_queries().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_feeds_back_claims_then_passes() {
        let llm = Arc::new(political_llm());
        llm.queue_text(fact_checker::PURPOSE, UNSUPPORTED);
        llm.queue_text(fact_checker::PURPOSE, SUPPORTED);
        let search = Arc::new(debt_search());
        let rt = runtime(&llm, &search, PipelineConfig::default());

        let result = rt
            .run_turn(DEBT_QUERY, vec![], CancellationToken::new())
            .await
            .unwrap();

        assert!(result.verified);
        assert_eq!(result.retry_count, 1);
        assert!(result.unsupported_claims.is_empty());

        let drafts = llm.requests_for(synthesizer::PURPOSE);
        assert_eq!(drafts.len(), 2);
        let retry_prompt = drafts[1].last_user_text().unwrap();
        assert!(retry_prompt.contains("- the vote was unanimous"));
    }

    #[tokio::test]
    async fn test_zero_retries_finalizes_after_first_failure() {
        let llm = Arc::new(political_llm());
        llm.set_default(fact_checker::PURPOSE, UNSUPPORTED);
        let search = Arc::new(debt_search());
        let rt = runtime(&llm, &search, PipelineConfig::default().with_max_retries(0));

        let result = rt
            .run_turn(DEBT_QUERY, vec![], CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.verified);
        assert_eq!(result.retry_count, 0);
        assert_eq!(llm.requests_for(synthesizer::PURPOSE).len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_fact_checker_ends_unverified_without_retry() {
        let llm = Arc::new(political_llm());
        llm.queue_error(fact_checker::PURPOSE, LlmError::server_error("500"));
        let search = Arc::new(debt_search());
        let rt = runtime(&llm, &search, PipelineConfig::default());

        let result = rt
            .run_turn(DEBT_QUERY, vec![], CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.verified);
        assert_eq!(result.retry_count, 0);
        assert_eq!(result.final_answer, DRAFT);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, StageErrorKind::VerificationError);
    }

    #[tokio::test]
    async fn test_every_collaborator_down_still_answers() {
        let llm = Arc::new(MockLlmClient::new());
        let search = Arc::new(
            MockSearchClient::new()
                .with_error(DEBT_QUERY, SearchError::Network("down".into())),
        );
        let rt = runtime(&llm, &search, PipelineConfig::default());

        let result = rt
            .run_turn(DEBT_QUERY, vec![], CancellationToken::new())
            .await
            .unwrap();

        // Router fails open, planner falls back to the raw query
        assert!(result.in_scope);
        assert_eq!(result.plan, vec![DEBT_QUERY]);
        assert!(!result.final_answer.is_empty());
        assert!(!result.verified);
        let kinds: Vec<_> = result.errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StageErrorKind::ClassificationError,
                StageErrorKind::PlanningError,
                StageErrorKind::SearchError,
                StageErrorKind::NeutralizationError,
                StageErrorKind::VerificationError,
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let llm = Arc::new(political_llm());
        let search = Arc::new(debt_search());
        let rt = runtime(&llm, &search, PipelineConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = rt.run_turn(DEBT_QUERY, vec![], cancel).await;

        assert_eq!(result, Err(TurnError::Cancelled));
        assert!(llm.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_takes_effect_between_stages() {
        let llm = Arc::new(political_llm().with_delay(Duration::from_millis(100)));
        let search = Arc::new(debt_search());
        let rt = runtime(&llm, &search, PipelineConfig::default());
        let cancel = CancellationToken::new();

        let started = llm.request_started.clone();
        let canceller = cancel.clone();
        let (result, ()) = tokio::join!(rt.run_turn(DEBT_QUERY, vec![], cancel), async move {
            started.notified().await;
            canceller.cancel();
        });

        assert_eq!(result, Err(TurnError::Cancelled));
        // The in-flight router call completes; nothing after it starts
        assert_eq!(llm.recorded_requests().len(), 1);
        assert!(search.recorded_queries().is_empty());
    }

    #[tokio::test]
    async fn test_history_reaches_router_and_grows() {
        let llm = Arc::new(MockLlmClient::new());
        llm.set_default(router::PURPOSE, r#"{"is_political": false}"#);
        let search = Arc::new(MockSearchClient::new());
        let rt = runtime(&llm, &search, PipelineConfig::default());
        let history = vec![Turn::user("Tell me about the filibuster"), Turn::assistant("...")];

        let result = rt
            .run_turn("and the weather?", history, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(llm.requests_for(router::PURPOSE)[0].messages.len(), 3);
        assert_eq!(result.history.len(), 4);
        assert_eq!(result.history[2].speaker, Speaker::User);
        assert_eq!(result.history[2].text, "and the weather?");
    }

    #[tokio::test]
    async fn test_concurrent_turns_are_independent() {
        let llm = Arc::new(MockLlmClient::new());
        llm.set_default(router::PURPOSE, r#"{"is_political": false}"#);
        let search = Arc::new(MockSearchClient::new());
        let rt = runtime(&llm, &search, PipelineConfig::default());

        let (a, b) = tokio::join!(
            rt.run_turn("first question", vec![], CancellationToken::new()),
            rt.run_turn("second question", vec![Turn::user("earlier")], CancellationToken::new()),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.turn_id, b.turn_id);
        assert_eq!(a.history.len(), 2);
        assert_eq!(a.history[0].text, "first question");
        assert_eq!(b.history.len(), 3);
        assert_eq!(b.history[1].text, "second question");
    }

    fn session_manager(llm: MockLlmClient) -> SessionManager {
        limited_session_manager(llm, SessionLimits::default())
    }

    fn limited_session_manager(llm: MockLlmClient, limits: SessionLimits) -> SessionManager {
        let llm: Arc<dyn LlmClient> = Arc::new(llm);
        let search: Arc<dyn SearchClient> = Arc::new(MockSearchClient::new());
        let runtime: SharedRuntime = TurnRuntime::new(PipelineConfig::default(), llm, search);
        SessionManager::new(Arc::new(runtime), limits)
    }

    fn deflecting_llm() -> MockLlmClient {
        let llm = MockLlmClient::new();
        llm.set_default(router::PURPOSE, r#"{"is_political": false}"#);
        llm
    }

    #[tokio::test]
    async fn test_session_accumulates_history() {
        let llm = MockLlmClient::new();
        llm.set_default(router::PURPOSE, r#"{"is_political": false}"#);
        let sessions = session_manager(llm);

        sessions.ask("s1", "one").await.unwrap();
        let second = sessions.ask("s1", "two").await.unwrap();

        assert_eq!(second.history.len(), 4);
        let session = sessions.get("s1").await.unwrap();
        assert_eq!(session.history, second.history);
        assert!(sessions.get("s2").await.is_none());
    }

    #[tokio::test]
    async fn test_session_removal() {
        let llm = MockLlmClient::new();
        llm.set_default(router::PURPOSE, r#"{"is_political": false}"#);
        let sessions = session_manager(llm);

        sessions.ask("s1", "one").await.unwrap();
        assert!(sessions.remove("s1").await);
        assert!(!sessions.remove("s1").await);
        assert!(sessions.get("s1").await.is_none());

        // Same id starts over
        let fresh = sessions.ask("s1", "again").await.unwrap();
        assert_eq!(fresh.history.len(), 2);
    }

    #[tokio::test]
    async fn test_session_cap_evicts_least_recently_used() {
        let limits = SessionLimits {
            max_sessions: 2,
            ..SessionLimits::default()
        };
        let sessions = limited_session_manager(deflecting_llm(), limits);

        sessions.ask("s1", "one").await.unwrap();
        sessions.ask("s2", "two").await.unwrap();
        // Touch s1 so s2 becomes the oldest
        sessions.ask("s1", "again").await.unwrap();
        sessions.ask("s3", "three").await.unwrap();

        assert!(sessions.get("s1").await.is_some());
        assert!(sessions.get("s2").await.is_none());
        assert!(sessions.get("s3").await.is_some());
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let limits = SessionLimits {
            idle_ttl: Duration::from_millis(5),
            ..SessionLimits::default()
        };
        let sessions = limited_session_manager(deflecting_llm(), limits);

        sessions.ask("old", "one").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        sessions.ask("new", "two").await.unwrap();

        assert!(sessions.get("old").await.is_none());
        assert!(sessions.get("new").await.is_some());
    }

    #[tokio::test]
    async fn test_busy_session_is_not_evicted() {
        let llm = deflecting_llm().with_delay(Duration::from_millis(100));
        let started = llm.request_started.clone();
        let limits = SessionLimits {
            max_sessions: 1,
            idle_ttl: Duration::ZERO,
        };
        let sessions = Arc::new(limited_session_manager(llm, limits));

        let busy = {
            let sessions = sessions.clone();
            tokio::spawn(async move { sessions.ask("busy", "slow").await })
        };
        started.notified().await;
        sessions.ask("other", "fast").await.unwrap();

        assert!(sessions.get("busy").await.is_some());
        let result = busy.await.unwrap().unwrap();
        assert_eq!(result.history.len(), 2);
    }
}
