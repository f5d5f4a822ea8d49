//! Per-turn conversation record
//!
//! One `ConversationState` is created for each user turn and threaded through
//! every pipeline stage. Each stage owns a disjoint set of fields and writes
//! them in one step once its work is complete.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who said a line of conversation history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// A prior line of conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// A piece of evidence, tagged with the sub-query that found it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source_query: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

/// Fact-checker output for one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub verdict: Verdict,
    pub unsupported_claims: Vec<String>,
    /// Number of distinct claims that were checked
    pub checked_claims: usize,
}

/// Router output beyond the in-scope flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub primary_entities: Vec<String>,
}

/// The six pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Router,
    Planner,
    Researcher,
    Synthesizer,
    Neutralizer,
    FactChecker,
}

impl StageName {
    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Router => "router",
            StageName::Planner => "planner",
            StageName::Researcher => "researcher",
            StageName::Synthesizer => "synthesizer",
            StageName::Neutralizer => "neutralizer",
            StageName::FactChecker => "fact_checker",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborator failure classes, one per stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageErrorKind {
    ClassificationError,
    PlanningError,
    SearchError,
    SynthesisError,
    NeutralizationError,
    VerificationError,
}

impl StageErrorKind {
    pub fn stage(self) -> StageName {
        match self {
            StageErrorKind::ClassificationError => StageName::Router,
            StageErrorKind::PlanningError => StageName::Planner,
            StageErrorKind::SearchError => StageName::Researcher,
            StageErrorKind::SynthesisError => StageName::Synthesizer,
            StageErrorKind::NeutralizationError => StageName::Neutralizer,
            StageErrorKind::VerificationError => StageName::FactChecker,
        }
    }
}

/// A recovered stage failure, reported to the caller alongside the answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: StageName,
    pub kind: StageErrorKind,
    pub message: String,
}

impl StageError {
    pub fn new(kind: StageErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage: kind.stage(),
            kind,
            message: message.into(),
        }
    }
}

/// Shared record for one user turn
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    query: String,
    pub history: Vec<Turn>,
    pub in_scope: Option<bool>,
    pub classification: Option<Classification>,
    pub plan: Vec<String>,
    pub evidence: Vec<Document>,
    pub draft: Option<String>,
    pub neutralized: Option<String>,
    pub verification: Option<Verification>,
    pub retry_count: u32,
    final_answer: Option<String>,
    verified: bool,
    pub errors: Vec<StageError>,
}

impl ConversationState {
    pub fn new(query: impl Into<String>, history: Vec<Turn>) -> Self {
        Self {
            query: query.into(),
            history,
            in_scope: None,
            classification: None,
            plan: Vec::new(),
            evidence: Vec::new(),
            draft: None,
            neutralized: None,
            verification: None,
            retry_count: 0,
            final_answer: None,
            verified: false,
            errors: Vec::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Set the terminal answer. Returns false, leaving the state untouched,
    /// if an answer was already set.
    pub fn finalize(&mut self, answer: impl Into<String>, verified: bool) -> bool {
        if self.final_answer.is_some() {
            return false;
        }
        self.final_answer = Some(answer.into());
        self.verified = verified;
        true
    }

    pub fn record_error(&mut self, error: StageError) {
        tracing::warn!(
            stage = %error.stage,
            kind = ?error.kind,
            message = %error.message,
            "Stage recovered from collaborator failure"
        );
        self.errors.push(error);
    }

    /// Unsupported claims from the most recent fact-check, if it failed
    pub fn unsupported_claims(&self) -> &[String] {
        match &self.verification {
            Some(v) if v.verdict == Verdict::Fail => &v.unsupported_claims,
            _ => &[],
        }
    }

    /// Append this turn to history. No-op until the turn has an answer.
    pub fn archive(&mut self) {
        if let Some(answer) = &self.final_answer {
            self.history.push(Turn::user(self.query.clone()));
            self.history.push(Turn::assistant(answer.clone()));
        }
    }

    pub fn into_result(self, turn_id: impl Into<String>) -> TurnResult {
        let unsupported_claims = self
            .verification
            .as_ref()
            .map(|v| v.unsupported_claims.clone())
            .unwrap_or_default();
        TurnResult {
            turn_id: turn_id.into(),
            final_answer: self.final_answer.unwrap_or_default(),
            verified: self.verified,
            in_scope: self.in_scope.unwrap_or(true),
            plan: self.plan,
            evidence: self.evidence,
            retry_count: self.retry_count,
            unsupported_claims,
            errors: self.errors,
            history: self.history,
        }
    }
}

/// What a completed turn hands back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub turn_id: String,
    pub final_answer: String,
    pub verified: bool,
    pub in_scope: bool,
    pub plan: Vec<String>,
    pub evidence: Vec<Document>,
    pub retry_count: u32,
    pub unsupported_claims: Vec<String>,
    pub errors: Vec<StageError>,
    /// History including this turn
    #[serde(skip)]
    pub history: Vec<Turn>,
}
