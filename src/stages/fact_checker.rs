//! Fact-checker: cross-checks claims in the neutralized text against evidence
//!
//! Sources are deduplicated and numbered the same way the synthesizer saw
//! them. The model extracts each factual claim together with the source
//! numbers it relies on; a claim counts as supported only if at least one of
//! those numbers names a real source. Repeat citations of one URL therefore
//! never add up to independent confirmation.

use super::{ask, parse_json_output, SourceIndex};
use crate::config::PipelineConfig;
use crate::conversation::{ConversationState, StageError, StageErrorKind, Verdict, Verification};
use crate::llm::LlmRequest;
use crate::runtime::LlmClient;
use crate::state_machine::Event;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

pub const PURPOSE: &str = "fact_checker";

const SYSTEM_PROMPT: &str = r#"You are a Fact-Checker. You compare an answer against a numbered list of sources.
Extract every discrete factual claim from the answer. Opinions attributed to a side ("supporters argue ...") are claims about what that side argues.
For each claim, list the numbers of the sources that directly support it. If no source supports it, use an empty list. Do not use outside knowledge.
Statements that only describe missing information are not claims.
Output ONLY a JSON array: [{"claim": "...", "sources": [1, 2]}]. Output [] if the answer makes no factual claims."#;

#[derive(Debug, Deserialize)]
struct ClaimCheck {
    #[serde(default)]
    claim: String,
    #[serde(default)]
    sources: Vec<Value>,
}

pub async fn fact_check(
    state: &mut ConversationState,
    llm: &dyn LlmClient,
    config: &PipelineConfig,
) -> Event {
    let sources = SourceIndex::from_evidence(&state.evidence);
    let answer = state.neutralized.clone().unwrap_or_default();
    let request = LlmRequest::new(PURPOSE, SYSTEM_PROMPT)
        .with_user(format!(
            "Sources:\n{}\nAnswer to check:\n{answer}",
            if sources.is_empty() { "(none)\n".to_string() } else { sources.render() }
        ))
        .with_max_tokens(2048);

    let checks = match ask(llm, &request, config.llm_timeout).await {
        Ok(text) => parse_json_output::<Vec<ClaimCheck>>(&text)
            .map_err(|e| format!("Unreadable fact-check output: {e}")),
        Err(e) => Err(format!("Fact-checker unavailable: {e}")),
    };

    let checks = match checks {
        Ok(checks) => checks,
        Err(message) => {
            state.record_error(StageError::new(StageErrorKind::VerificationError, message));
            state.verification = None;
            return Event::CheckUnavailable;
        }
    };

    let verification = assess(&checks, &sources, config.unsupported_claim_tolerance);
    tracing::info!(
        verdict = ?verification.verdict,
        checked = verification.checked_claims,
        unsupported = verification.unsupported_claims.len(),
        sources = sources.len(),
        "Fact-check complete"
    );
    let verdict = verification.verdict;
    state.verification = Some(verification);
    Event::Checked { verdict }
}

fn assess(checks: &[ClaimCheck], sources: &SourceIndex, tolerance: usize) -> Verification {
    let mut seen = HashSet::new();
    let mut checked_claims = 0;
    let mut unsupported_claims = Vec::new();

    for check in checks {
        let claim = check.claim.trim();
        if claim.is_empty() || !seen.insert(claim.to_lowercase()) {
            continue;
        }
        checked_claims += 1;

        let supported = check
            .sources
            .iter()
            .filter_map(source_number)
            .any(|n| sources.get(n).is_some());
        if !supported {
            unsupported_claims.push(claim.to_string());
        }
    }

    let verdict = if unsupported_claims.len() <= tolerance {
        Verdict::Pass
    } else {
        Verdict::Fail
    };
    Verification {
        verdict,
        unsupported_claims,
        checked_claims,
    }
}

/// Accepts 2, "2", and "[2]"
fn source_number(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .ok(),
        _ => None,
    }
}
