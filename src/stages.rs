//! The six pipeline stages
//!
//! Each stage reads the conversation record, calls at most one kind of
//! collaborator, writes its own fields, and returns the event for the state
//! machine. Collaborator failures are recorded on the record and replaced by
//! the stage's fallback; no stage returns an error.

pub mod fact_checker;
pub mod neutralizer;
pub mod planner;
pub mod researcher;
pub mod router;
mod sources;
pub mod synthesizer;

pub use sources::SourceIndex;

use crate::conversation::{Speaker, Turn};
use crate::llm::{LlmError, LlmMessage, LlmRequest};
use crate::runtime::LlmClient;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Run one LLM call under the caller's deadline and return its trimmed text
pub(crate) async fn ask(
    llm: &dyn LlmClient,
    request: &LlmRequest,
    deadline: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(deadline, llm.complete(request)).await {
        Ok(Ok(response)) => {
            let text = response.text.trim();
            if text.is_empty() {
                Err(LlmError::malformed("Empty completion"))
            } else {
                Ok(text.to_string())
            }
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(LlmError::timeout(format!(
            "No response within {} ms",
            deadline.as_millis()
        ))),
    }
}

/// Prior turns as chat messages
pub(crate) fn history_messages(history: &[Turn]) -> Vec<LlmMessage> {
    history
        .iter()
        .map(|turn| match turn.speaker {
            Speaker::User => LlmMessage::user(turn.text.clone()),
            Speaker::Assistant => LlmMessage::assistant(turn.text.clone()),
        })
        .collect()
}

/// Remove a surrounding markdown code fence, with or without a language tag
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse JSON from model output, tolerating fences and surrounding prose
pub(crate) fn parse_json_output<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let cleaned = strip_code_fences(text);
    match serde_json::from_str(cleaned) {
        Ok(value) => Ok(value),
        Err(first_err) => embedded_json(cleaned).ok_or(first_err),
    }
}

/// The first `{...}` or `[...]` value in `text` that deserializes as `T`
///
/// Every opening bracket is a candidate, so citation markers such as "[1]"
/// in leading prose do not hide the real payload. Trailing prose is ignored.
fn embedded_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    text.char_indices()
        .filter(|(_, c)| matches!(c, '{' | '['))
        .find_map(|(start, _)| {
            serde_json::Deserializer::from_str(text.get(start..)?)
                .into_iter::<T>()
                .next()?
                .ok()
        })
}

/// Truncate to at most `max_chars` characters on a char boundary
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", text.get(..idx).unwrap_or(text)),
        None => text.to_string(),
    }
}
