//! Researcher: runs every planned sub-query against the search collaborator
//!
//! Sub-queries are dispatched concurrently and joined before anything is
//! written, so evidence always lands in plan order. Every hit a sub-query
//! returns becomes a document, even one without a snippet. A failed sub-query
//! contributes nothing; the stage never fails as a whole.

use crate::config::PipelineConfig;
use crate::conversation::{ConversationState, Document, StageError, StageErrorKind};
use crate::runtime::SearchClient;
use crate::search::{SearchError, SearchHit};
use crate::state_machine::Event;
use futures::future::join_all;

pub async fn research(
    state: &mut ConversationState,
    search: &dyn SearchClient,
    config: &PipelineConfig,
) -> Event {
    let deadline = config.search_timeout;
    let lookups = state.plan.iter().map(|sub_query| async move {
        let result = match tokio::time::timeout(deadline, search.search(sub_query)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(deadline.as_millis())),
        };
        (sub_query.clone(), result)
    });
    let results: Vec<(String, Result<Vec<SearchHit>, SearchError>)> = join_all(lookups).await;

    let mut documents = Vec::new();
    let mut failures = Vec::new();
    for (sub_query, result) in results {
        match result {
            Ok(hits) => documents.extend(hits.into_iter().map(|hit| Document {
                source_query: sub_query.clone(),
                url: hit.url,
                snippet: hit.snippet,
            })),
            Err(e) => failures.push(StageError::new(
                StageErrorKind::SearchError,
                format!("Sub-query {sub_query:?} failed: {e}"),
            )),
        }
    }

    if !state.plan.is_empty() && failures.len() == state.plan.len() {
        tracing::warn!(
            sub_queries = state.plan.len(),
            "Every search sub-query failed; continuing without evidence"
        );
    }

    for failure in failures {
        state.record_error(failure);
    }
    tracing::info!(documents = documents.len(), "Research complete");
    state.evidence.extend(documents);

    Event::Researched {
        documents: state.evidence.len(),
    }
}
