//! Numbered, URL-deduplicated view of the evidence
//!
//! The synthesizer cites sources by number and the fact-checker resolves those
//! numbers, so both build the index the same way. Documents whose URLs differ
//! only in scheme, host case, a leading `www.`, a default port, a trailing
//! slash or a fragment count as one source. Path and query keep their case.

use super::truncate_chars;
use crate::conversation::Document;
use std::fmt::Write;
use url::Url;

const MAX_SNIPPET_CHARS: usize = 1_200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// 1-based citation number
    pub number: usize,
    pub url: String,
    pub snippets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceIndex {
    sources: Vec<Source>,
}

impl SourceIndex {
    pub fn from_evidence(evidence: &[Document]) -> Self {
        let mut sources: Vec<Source> = Vec::new();
        let mut keys: Vec<String> = Vec::new();

        for doc in evidence {
            let key = normalize_url(&doc.url);
            let snippet = doc.snippet.trim();
            if let Some(pos) = keys.iter().position(|k| *k == key) {
                let source = &mut sources[pos];
                if !snippet.is_empty() && !source.snippets.iter().any(|s| s == snippet) {
                    source.snippets.push(snippet.to_string());
                }
            } else {
                keys.push(key);
                sources.push(Source {
                    number: sources.len() + 1,
                    url: doc.url.clone(),
                    snippets: if snippet.is_empty() {
                        vec![]
                    } else {
                        vec![snippet.to_string()]
                    },
                });
            }
        }

        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn get(&self, number: usize) -> Option<&Source> {
        number.checked_sub(1).and_then(|i| self.sources.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    /// Prompt rendering: `[n] url` followed by the snippet text
    ///
    /// Sources without any snippet are left out; their numbers stay reserved.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for source in self.sources.iter().filter(|s| !s.snippets.is_empty()) {
            let _ = writeln!(out, "[{}] {}", source.number, source.url);
            let joined = source.snippets.join(" … ");
            let _ = writeln!(out, "{}\n", truncate_chars(&joined, MAX_SNIPPET_CHARS));
        }
        out
    }
}

/// Canonical form of a URL for duplicate detection
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return trimmed.trim_end_matches('/').to_string();
    };
    let Some(host) = parsed.host_str() else {
        return trimmed.trim_end_matches('/').to_string();
    };

    // Url already lowercases the host and drops the scheme's default port
    let mut key = host.strip_prefix("www.").unwrap_or(host).to_string();
    if let Some(port) = parsed.port() {
        let _ = write!(key, ":{port}");
    }
    key.push_str(parsed.path().trim_end_matches('/'));
    if let Some(query) = parsed.query() {
        let _ = write!(key, "?{query}");
    }
    key
}
