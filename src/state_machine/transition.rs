//! Pure phase transition function
//!
//! Given the same phase, context, and event, `transition` always returns the
//! same result and performs no I/O.

use super::{Effect, Event, Outcome, Phase, TurnContext, UnverifiedReason};
use crate::conversation::Verdict;
use thiserror::Error;

/// Result of a phase transition
#[derive(Debug, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_phase: Phase,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(phase: Phase) -> Self {
        Self {
            new_phase: phase,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn done(outcome: Outcome) -> Self {
        Self::new(Phase::Done { outcome })
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Turn already finished")]
    TurnComplete,
    #[error("Planner produced an empty plan")]
    EmptyPlan,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

pub fn transition(
    phase: &Phase,
    context: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (phase, event) {
        (Phase::Done { .. }, _) => Err(TransitionError::TurnComplete),

        // Cancellation is honoured between any two stages
        (_, Event::Cancel) => Ok(TransitionResult::done(Outcome::Cancelled)),

        // ============================================================
        // Routing: the only early exit
        // ============================================================
        (Phase::Routing, Event::Routed { in_scope: false }) => {
            Ok(TransitionResult::done(Outcome::Deflected)
                .with_effect(Effect::Deflect)
                .with_effect(Effect::ArchiveTurn))
        }

        (Phase::Routing, Event::Routed { in_scope: true }) => {
            Ok(TransitionResult::new(Phase::Planning))
        }

        // ============================================================
        // Planning and research run exactly once per turn
        // ============================================================
        (Phase::Planning, Event::Planned { sub_queries: 0 }) => Err(TransitionError::EmptyPlan),

        (Phase::Planning, Event::Planned { .. }) => Ok(TransitionResult::new(Phase::Researching)),

        // Empty evidence still proceeds; synthesis states the limitation
        (Phase::Researching, Event::Researched { .. }) => {
            Ok(TransitionResult::new(Phase::Synthesizing { attempt: 0 }))
        }

        // ============================================================
        // Answer loop
        // ============================================================
        (Phase::Synthesizing { attempt }, Event::Synthesized) => {
            Ok(TransitionResult::new(Phase::Neutralizing { attempt: *attempt }))
        }

        (Phase::Neutralizing { attempt }, Event::Neutralized) => {
            Ok(TransitionResult::new(Phase::FactChecking { attempt: *attempt }))
        }

        (Phase::FactChecking { .. }, Event::Checked { verdict: Verdict::Pass }) => {
            Ok(TransitionResult::done(Outcome::Verified)
                .with_effect(Effect::Finalize { verified: true })
                .with_effect(Effect::ArchiveTurn))
        }

        // Fail with budget left: back to synthesis, evidence reused
        (Phase::FactChecking { attempt }, Event::Checked { verdict: Verdict::Fail })
            if *attempt < context.max_retries =>
        {
            Ok(TransitionResult::new(Phase::Synthesizing {
                attempt: attempt + 1,
            })
            .with_effect(Effect::IncrementRetry))
        }

        // Fail with budget spent: deliver anyway, flagged
        (Phase::FactChecking { .. }, Event::Checked { verdict: Verdict::Fail }) => {
            Ok(TransitionResult::done(Outcome::Unverified {
                reason: UnverifiedReason::RetriesExhausted,
            })
            .with_effect(Effect::Finalize { verified: false })
            .with_effect(Effect::ArchiveTurn))
        }

        (Phase::FactChecking { .. }, Event::CheckUnavailable) => {
            Ok(TransitionResult::done(Outcome::Unverified {
                reason: UnverifiedReason::VerificationUnavailable,
            })
            .with_effect(Effect::Finalize { verified: false })
            .with_effect(Effect::ArchiveTurn))
        }

        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {phase:?} with event {event:?}"
        ))),
    }
}
