//! Turn executor
//!
//! Drives one `ConversationState` through the phases: run the stage for the
//! current phase, feed its event to `transition`, apply the returned effects.
//! Cancellation is only observed between stages.

use super::traits::{LlmClient, SearchClient};
use crate::config::PipelineConfig;
use crate::conversation::{ConversationState, StageName, Turn, TurnResult};
use crate::stages::{fact_checker, neutralizer, planner, researcher, router, synthesizer};
use crate::state_machine::{transition, Effect, Event, Outcome, Phase, TurnContext};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("Turn cancelled before completion")]
    Cancelled,
}

/// Generic turn runtime that can work with any LLM and search implementations
pub struct TurnRuntime<L, S>
where
    L: LlmClient + 'static,
    S: SearchClient + 'static,
{
    config: PipelineConfig,
    llm_client: Arc<L>,
    search_client: Arc<S>,
}

impl<L, S> TurnRuntime<L, S>
where
    L: LlmClient + 'static,
    S: SearchClient + 'static,
{
    pub fn new(config: PipelineConfig, llm_client: L, search_client: S) -> Self {
        Self {
            config,
            llm_client: Arc::new(llm_client),
            search_client: Arc::new(search_client),
        }
    }

    pub fn model_id(&self) -> &str {
        self.llm_client.model_id()
    }

    /// Answer one user query. `history` is the prior conversation; the
    /// returned result carries it extended by this turn.
    pub async fn run_turn(
        &self,
        query: impl Into<String>,
        history: Vec<Turn>,
        cancel: CancellationToken,
    ) -> Result<TurnResult, TurnError> {
        let context =
            TurnContext::new(uuid::Uuid::new_v4().to_string(), self.config.max_retries);
        let mut state = ConversationState::new(query, history);
        let mut phase = Phase::Routing;
        let started = Instant::now();

        tracing::info!(
            turn_id = %context.turn_id,
            history_turns = state.history.len(),
            "Starting turn"
        );

        while let Some(stage) = phase.stage() {
            let event = if cancel.is_cancelled() {
                Event::Cancel
            } else {
                self.run_stage(stage, &mut state, &context.turn_id).await
            };

            let result = match transition(&phase, &context, event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(
                        turn_id = %context.turn_id,
                        phase = phase.name(),
                        error = %e,
                        "Transition rejected; ending turn with best available answer"
                    );
                    settle(&mut state);
                    break;
                }
            };

            tracing::debug!(
                turn_id = %context.turn_id,
                from = phase.name(),
                to = result.new_phase.name(),
                effects = ?result.effects,
                "Phase transition"
            );
            phase = result.new_phase;

            for effect in result.effects {
                apply_effect(&mut state, effect);
            }
        }

        if let Phase::Done { outcome: Outcome::Cancelled } = phase {
            tracing::info!(turn_id = %context.turn_id, "Turn cancelled");
            return Err(TurnError::Cancelled);
        }

        tracing::info!(
            turn_id = %context.turn_id,
            outcome = ?phase,
            verified = state.is_verified(),
            retry_count = state.retry_count,
            errors = state.errors.len(),
            duration_ms = %started.elapsed().as_millis(),
            "Turn complete"
        );
        Ok(state.into_result(context.turn_id))
    }

    async fn run_stage(&self, stage: StageName, state: &mut ConversationState, turn_id: &str) -> Event {
        let llm: &L = &self.llm_client;
        let config = &self.config;
        let start = Instant::now();

        let event = match stage {
            StageName::Router => router::route(state, llm, config).await,
            StageName::Planner => planner::plan(state, llm, config).await,
            StageName::Researcher => {
                researcher::research(state, self.search_client.as_ref(), config).await
            }
            StageName::Synthesizer => synthesizer::synthesize(state, llm, config).await,
            StageName::Neutralizer => neutralizer::neutralize(state, llm, config).await,
            StageName::FactChecker => fact_checker::fact_check(state, llm, config).await,
        };

        tracing::debug!(
            turn_id,
            stage = %stage,
            retry_count = state.retry_count,
            duration_ms = %start.elapsed().as_millis(),
            event = ?event,
            "Stage finished"
        );
        event
    }
}

fn apply_effect(state: &mut ConversationState, effect: Effect) {
    match effect {
        Effect::Deflect => {
            if !state.finalize(router::DEFLECTION_MESSAGE, true) {
                tracing::warn!("Deflection ignored; answer already set");
            }
        }
        Effect::IncrementRetry => state.retry_count += 1,
        Effect::Finalize { verified } => {
            let answer = state.neutralized.clone().unwrap_or_default();
            if !state.finalize(answer, verified) {
                tracing::warn!("Finalize ignored; answer already set");
            }
        }
        Effect::ArchiveTurn => state.archive(),
    }
}

/// Close a turn the state machine refused to continue
fn settle(state: &mut ConversationState) {
    let answer = state
        .neutralized
        .clone()
        .or_else(|| state.draft.clone())
        .unwrap_or_else(|| synthesizer::limitation_draft(state.query()));
    state.finalize(answer, false);
    state.archive();
}
