//! Stage outcomes that drive phase transitions

use crate::conversation::Verdict;

/// Events that trigger phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Router
    Routed { in_scope: bool },

    // Planner / Researcher
    Planned { sub_queries: usize },
    Researched { documents: usize },

    // Answer loop
    Synthesized,
    Neutralized,
    Checked { verdict: Verdict },
    /// The fact-checker could not produce a verdict at all
    CheckUnavailable,

    // Caller
    Cancel,
}
