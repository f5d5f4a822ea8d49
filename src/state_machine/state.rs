//! Pipeline phase types

use crate::conversation::StageName;
use serde::{Deserialize, Serialize};

/// Where a turn currently is in the pipeline
///
/// `attempt` on the answer-producing phases counts fact-check failures that
/// led back to synthesis, and always mirrors `ConversationState::retry_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Phase {
    /// Classifying the query as in or out of scope
    Routing,
    /// Decomposing the query into sub-queries
    Planning,
    /// Running every sub-query against the search collaborator
    Researching,
    Synthesizing { attempt: u32 },
    Neutralizing { attempt: u32 },
    FactChecking { attempt: u32 },
    /// Terminal
    Done { outcome: Outcome },
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done { .. })
    }

    /// The stage that runs in this phase, if any
    pub fn stage(&self) -> Option<StageName> {
        match self {
            Phase::Routing => Some(StageName::Router),
            Phase::Planning => Some(StageName::Planner),
            Phase::Researching => Some(StageName::Researcher),
            Phase::Synthesizing { .. } => Some(StageName::Synthesizer),
            Phase::Neutralizing { .. } => Some(StageName::Neutralizer),
            Phase::FactChecking { .. } => Some(StageName::FactChecker),
            Phase::Done { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Routing => "routing",
            Phase::Planning => "planning",
            Phase::Researching => "researching",
            Phase::Synthesizing { .. } => "synthesizing",
            Phase::Neutralizing { .. } => "neutralizing",
            Phase::FactChecking { .. } => "fact_checking",
            Phase::Done { .. } => "done",
        }
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Out of scope; answered with the deflection message
    Deflected,
    /// Fact-check passed
    Verified,
    /// Answer delivered without a passing fact-check
    Unverified { reason: UnverifiedReason },
    /// Caller cancelled between stages; no answer
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnverifiedReason {
    RetriesExhausted,
    VerificationUnavailable,
}

/// Immutable per-turn settings the transition function consults
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub turn_id: String,
    pub max_retries: u32,
}

impl TurnContext {
    pub fn new(turn_id: impl Into<String>, max_retries: u32) -> Self {
        Self {
            turn_id: turn_id.into(),
            max_retries,
        }
    }
}
