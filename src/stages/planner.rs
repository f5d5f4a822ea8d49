//! Planner: splits an in-scope query into independent search sub-queries
//!
//! The plan is written once per turn. When the model gives nothing usable the
//! plan degrades to the original query, so research always has work to do.

use super::{ask, history_messages, parse_json_output};
use crate::config::PipelineConfig;
use crate::conversation::{ConversationState, StageError, StageErrorKind};
use crate::llm::LlmRequest;
use crate::runtime::LlmClient;
use crate::state_machine::Event;
use serde_json::Value;
use std::collections::HashSet;

pub const PURPOSE: &str = "planner";

const SYSTEM_PROMPT: &str = r#"You are a Research Strategist. Your goal is to turn a political query into a multi-perspective search plan.
Decompose: cover the mainstream arguments in favour, the mainstream arguments against, and the legal or historical context.
Diversity of Search: Generate between 1 and {max} distinct, independently searchable queries. At least one query must be phrased to find opposing viewpoints (e.g. "critiques of [Policy X]").
Avoid partisan language in the queries themselves.
Constraint: Return ONLY a JSON array of strings, e.g. ["query 1", "query 2"]."#;

pub async fn plan(
    state: &mut ConversationState,
    llm: &dyn LlmClient,
    config: &PipelineConfig,
) -> Event {
    let max = config.max_plan_size.max(1);
    let request = LlmRequest::new(PURPOSE, SYSTEM_PROMPT.replace("{max}", &max.to_string()))
        .with_messages(history_messages(&state.history))
        .with_user(planning_prompt(state))
        .with_max_tokens(512);

    let planned = match ask(llm, &request, config.llm_timeout).await {
        Ok(text) => parse_plan(&text, max),
        Err(e) => Err(format!("Planner unavailable: {e}")),
    };

    let sub_queries = match planned {
        Ok(sub_queries) => sub_queries,
        Err(message) => {
            state.record_error(StageError::new(StageErrorKind::PlanningError, message));
            vec![state.query().to_string()]
        }
    };

    tracing::info!(sub_queries = sub_queries.len(), plan = ?sub_queries, "Planner created search plan");
    state.plan = sub_queries;
    Event::Planned {
        sub_queries: state.plan.len(),
    }
}

fn planning_prompt(state: &ConversationState) -> String {
    match &state.classification {
        Some(c) if !c.category.is_empty() || !c.primary_entities.is_empty() => format!(
            "Query: {}\nCore tension: {}\nKey entities: {}",
            state.query(),
            c.category,
            c.primary_entities.join(", ")
        ),
        _ => format!("Query: {}", state.query()),
    }
}

/// Clean model output into a bounded, duplicate-free list
fn parse_plan(text: &str, max: usize) -> Result<Vec<String>, String> {
    let items: Vec<Value> =
        parse_json_output(text).map_err(|e| format!("Unreadable plan output: {e}"))?;

    let mut seen = HashSet::new();
    let sub_queries: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .take(max)
        .collect();

    if sub_queries.is_empty() {
        Err("Planner returned no usable sub-queries".to_string())
    } else {
        Ok(sub_queries)
    }
}
