//! Neutralizer: rewrites partisan or loaded phrasing in the draft
//!
//! Two layers: a lexical screen over a short list of framing words, and an LLM
//! linguistic audit. The audit may rewrite the text; a rewrite that changes the
//! length too much is taken as a content change and discarded. The lexical
//! substitution is only the fallback for when the auditor is unreachable or its
//! answer is unusable. A `NEUTRAL` verdict leaves the draft untouched.

use super::ask;
use crate::config::PipelineConfig;
use crate::conversation::{ConversationState, StageError, StageErrorKind};
use crate::llm::LlmRequest;
use crate::runtime::LlmClient;
use crate::state_machine::Event;
use regex::{Captures, Regex};
use std::sync::LazyLock;

pub const PURPOSE: &str = "neutralizer";

/// Reply the auditor gives when no change is needed
pub const NEUTRAL_MARKER: &str = "NEUTRAL";

const SYSTEM_PROMPT: &str = r#"You are a Linguistic Auditor. You review drafts for hidden partisan bias.
Adjective Check: Identify loaded or emotionally charged words (e.g. "radical", "common-sense", "so-called") and replace them with neutral wording. Keep words that state facts, such as "extreme poverty" or "sanctions regime".
Balance Check: Make sure no perspective is described more favourably than another.
Preserve every factual statement, every [n] citation, and the section structure. Do not add any new facts or claims.
Output: If the draft is already neutral, reply with exactly NEUTRAL. Otherwise reply with the full rewritten draft and nothing else."#;

/// Framing word and its neutral replacement
///
/// Only words that carry tone and no fact belong here: "extreme poverty",
/// "sanctions regime" or "Ponzi scheme" must survive substitution.
const LOADED_TERMS: &[(&str, &str)] = &[
    ("radical", "far-reaching"),
    ("common-sense", "proposed"),
    ("common sense", "proposed"),
    ("job-killing", "economically contested"),
    ("draconian", "strict"),
    ("heartless", "restrictive"),
    ("un-american", "controversial"),
    ("so-called", ""),
    ("slammed", "criticized"),
    ("blasted", "criticized"),
];

/// Rewrites outside this ratio of the draft length are rejected
const MIN_REWRITE_RATIO: f64 = 0.5;
const MAX_REWRITE_RATIO: f64 = 2.0;

static LOADED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Longest first so "common-sense" is tried before shorter overlaps
    let mut terms: Vec<&str> = LOADED_TERMS.iter().map(|(term, _)| *term).collect();
    terms.sort_by_key(|t| std::cmp::Reverse(t.len()));
    let alternation = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b({alternation})\b(\s?)")).expect("loaded-term pattern is valid")
});

pub async fn neutralize(
    state: &mut ConversationState,
    llm: &dyn LlmClient,
    config: &PipelineConfig,
) -> Event {
    let draft = state.draft.clone().unwrap_or_default();
    let findings = screen(&draft);

    let neutralized = if findings.is_empty() && !config.neutralizer_audit {
        draft.clone()
    } else {
        let request = LlmRequest::new(PURPOSE, SYSTEM_PROMPT)
            .with_user(audit_prompt(&draft, &findings))
            .with_max_tokens(2048);

        match ask(llm, &request, config.llm_timeout).await {
            Ok(reply) => match judge_reply(&draft, &reply) {
                AuditVerdict::Neutral => draft.clone(),
                AuditVerdict::Rewrite(rewrite) => rewrite,
                AuditVerdict::Unusable => substitute(&draft),
            },
            Err(e) => {
                state.record_error(StageError::new(
                    StageErrorKind::NeutralizationError,
                    format!("Auditor unavailable: {e}"),
                ));
                substitute(&draft)
            }
        }
    };

    tracing::info!(
        findings = ?findings,
        changed = neutralized != draft,
        "Neutralization complete"
    );
    state.neutralized = Some(neutralized);
    Event::Neutralized
}

fn audit_prompt(draft: &str, findings: &[String]) -> String {
    if findings.is_empty() {
        format!("Draft:\n{draft}")
    } else {
        format!(
            "Loaded terms already detected: {}\n\nDraft:\n{draft}",
            findings.join(", ")
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
enum AuditVerdict {
    /// Draft is fine as written
    Neutral,
    Rewrite(String),
    /// Critique or a rewrite that changes content; fall back to substitution
    Unusable,
}

fn judge_reply(draft: &str, reply: &str) -> AuditVerdict {
    let reply = reply.trim();
    if reply.trim_end_matches(['.', '!']).eq_ignore_ascii_case(NEUTRAL_MARKER) {
        return AuditVerdict::Neutral;
    }
    // An instruction instead of a rewrite
    if reply.starts_with("BIAS") {
        tracing::debug!("Auditor returned critique instead of rewrite");
        return AuditVerdict::Unusable;
    }

    #[allow(clippy::cast_precision_loss)]
    let ratio = reply.chars().count() as f64 / draft.chars().count().max(1) as f64;
    if (MIN_REWRITE_RATIO..=MAX_REWRITE_RATIO).contains(&ratio) {
        AuditVerdict::Rewrite(reply.to_string())
    } else {
        tracing::warn!(ratio, "Discarding auditor rewrite that changes content length");
        AuditVerdict::Unusable
    }
}

/// Loaded terms present in `text`, lowercased, in order of first appearance
pub fn screen(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in LOADED_PATTERN.find_iter(text) {
        let term = m.as_str().trim_end().to_lowercase();
        if !found.contains(&term) {
            found.push(term);
        }
    }
    found
}

/// Replace every loaded term with its neutral counterpart
pub fn substitute(text: &str) -> String {
    LOADED_PATTERN
        .replace_all(text, |caps: &Captures<'_>| {
            let matched = &caps[1];
            let key = matched.to_lowercase();
            let replacement = LOADED_TERMS
                .iter()
                .find(|(term, _)| *term == key)
                .map_or("", |(_, replacement)| *replacement);
            // Dropped terms take their trailing space with them
            if replacement.is_empty() {
                return String::new();
            }
            format!("{}{}", match_case(matched, replacement), &caps[2])
        })
        .into_owned()
}

fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().next().is_some_and(char::is_uppercase) {
        let mut chars = replacement.chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_uppercase().chain(chars).collect()
        })
    } else {
        replacement.to_string()
    }
}
