//! Router: decides whether a query belongs to the political domain
//!
//! This is the only stage that can end a turn early. If the classifier call
//! fails or its output cannot be read, the query is treated as in scope.

use super::{ask, history_messages, parse_json_output};
use crate::config::PipelineConfig;
use crate::conversation::{Classification, ConversationState, StageError, StageErrorKind};
use crate::llm::LlmRequest;
use crate::runtime::LlmClient;
use crate::state_machine::Event;
use serde::Deserialize;
use serde_json::Value;

pub const PURPOSE: &str = "router";

pub const DEFLECTION_MESSAGE: &str =
    "I am a specialized Political Intelligence Agent. I can only assist with political queries.";

const SYSTEM_PROMPT: &str = r#"You are the Lead Dispatcher for a Political Intelligence Agent. Your task is to analyze the user's intent.
Categorize: Is this a factual political query, a request for policy analysis, or non-political?
Boundary Check: Weather, homework, recipes, sports scores and similar requests are non-political.
Complexity: If political, identify the core tension in the topic (e.g. "Economic Impact vs. Social Equity") and use it as the category.
Use the earlier conversation only to resolve references such as "that bill" or "what about the other side".
Constraint: Do not answer the question. Output only a JSON object with the keys "category" (string), "is_political" (boolean), and "primary_entities" (array of strings)."#;

#[derive(Debug, Deserialize)]
struct RouterOutput {
    #[serde(default)]
    category: String,
    #[serde(default)]
    is_political: Value,
    #[serde(default)]
    primary_entities: Vec<Value>,
}

pub async fn route(
    state: &mut ConversationState,
    llm: &dyn LlmClient,
    config: &PipelineConfig,
) -> Event {
    let request = LlmRequest::new(PURPOSE, SYSTEM_PROMPT)
        .with_messages(history_messages(&state.history))
        .with_user(state.query())
        .with_max_tokens(256);

    let outcome = match ask(llm, &request, config.llm_timeout).await {
        Ok(text) => parse_classification(&text),
        Err(e) => Err(format!("Classifier unavailable: {e}")),
    };

    let in_scope = match outcome {
        Ok((in_scope, classification)) => {
            tracing::info!(
                in_scope,
                category = %classification.category,
                entities = ?classification.primary_entities,
                "Router decision"
            );
            state.classification = Some(classification);
            in_scope
        }
        Err(message) => {
            state.record_error(StageError::new(StageErrorKind::ClassificationError, message));
            true
        }
    };

    state.in_scope = Some(in_scope);
    Event::Routed { in_scope }
}

fn parse_classification(text: &str) -> Result<(bool, Classification), String> {
    let output: RouterOutput = parse_json_output(text)
        .map_err(|e| format!("Unreadable classifier output: {e}"))?;

    let in_scope = as_bool(&output.is_political)
        .ok_or_else(|| format!("Classifier output lacks a boolean is_political: {}", output.is_political))?;

    let primary_entities = output
        .primary_entities
        .iter()
        .filter_map(|v| v.as_str().map(str::trim))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    Ok((
        in_scope,
        Classification {
            category: output.category.trim().to_string(),
            primary_entities,
        },
    ))
}

/// Small models sometimes quote booleans
fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
