//! Synthesizer: drafts a balanced answer from the collected evidence
//!
//! With no evidence the draft is a fixed limitation statement and the model
//! is not consulted, so nothing can be fabricated. On a retry pass the claims
//! the fact-checker rejected are fed back for removal or re-grounding.

use super::{ask, history_messages, SourceIndex};
use crate::config::PipelineConfig;
use crate::conversation::{ConversationState, StageError, StageErrorKind};
use crate::llm::LlmRequest;
use crate::runtime::LlmClient;
use crate::state_machine::Event;
use std::fmt::Write;

pub const PURPOSE: &str = "synthesizer";

const SYSTEM_PROMPT: &str = r#"You are a Neutral Policy Analyst. Your goal is to synthesize search results into a balanced report.
Structure: Start with a neutral overview, followed by "Perspective A", then "Perspective B", and conclude with "Areas of Consensus/Uncertainty". When the topic is not contested, say so in the overview instead of inventing a second side.
Attribution: Every factual claim must be tied to a numbered source, written as [n]. Use only the numbered sources provided; never cite anything else.
If the sources do not answer part of the question, say that the information is not available rather than guessing.
Constraint: Do not use "Golden Mean" fallacies. Present the strongest version of each side's argument fairly."#;

pub async fn synthesize(
    state: &mut ConversationState,
    llm: &dyn LlmClient,
    config: &PipelineConfig,
) -> Event {
    let sources = SourceIndex::from_evidence(&state.evidence);

    let draft = if sources.is_empty() {
        tracing::info!("No evidence available; drafting limitation statement");
        limitation_draft(state.query())
    } else {
        let request = LlmRequest::new(PURPOSE, SYSTEM_PROMPT)
            .with_messages(history_messages(&state.history))
            .with_user(synthesis_prompt(state, &sources))
            .with_max_tokens(2048);

        match ask(llm, &request, config.llm_timeout).await {
            Ok(text) => text,
            Err(e) => {
                state.record_error(StageError::new(
                    StageErrorKind::SynthesisError,
                    format!("Synthesizer unavailable: {e}"),
                ));
                fallback_draft(state.query(), &sources)
            }
        }
    };

    tracing::info!(
        retry_count = state.retry_count,
        sources = sources.len(),
        chars = draft.len(),
        "Draft ready"
    );
    state.draft = Some(draft);
    Event::Synthesized
}

fn synthesis_prompt(state: &ConversationState, sources: &SourceIndex) -> String {
    let mut prompt = format!(
        "Sources:\n{}\nUser Question: {}\n",
        sources.render(),
        state.query()
    );

    let rejected = state.unsupported_claims();
    if !rejected.is_empty() {
        prompt.push_str(
            "\nPREVIOUS FEEDBACK TO ADDRESS: a fact-check found these claims in your last draft \
             unsupported by the sources. Remove each one, or restate it so that it is directly \
             supported by a cited source:\n",
        );
        for claim in rejected {
            let _ = writeln!(prompt, "- {claim}");
        }
    }
    prompt
}

/// Draft used when there is no evidence at all
pub fn limitation_draft(query: &str) -> String {
    format!(
        "I could not find sufficient information to answer \"{query}\". \
         The search for supporting sources returned no usable results, so no \
         claims are made here. Please try rephrasing the question or asking again later."
    )
}

/// Draft used when sources exist but the model could not write the answer
fn fallback_draft(query: &str, sources: &SourceIndex) -> String {
    let mut draft = format!(
        "I was unable to compose a full answer to \"{query}\" at this time. \
         The following sources were found and may be consulted directly:\n"
    );
    for source in sources.iter() {
        let _ = writeln!(draft, "[{}] {}", source.number, source.url);
    }
    draft
}
