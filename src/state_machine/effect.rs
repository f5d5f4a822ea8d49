//! Effects produced by phase transitions

/// Bookkeeping the controller applies to the conversation record after a
/// transition. Stage output itself is written by the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// `final_answer` := the deflection message
    Deflect,
    /// `retry_count` += 1
    IncrementRetry,
    /// `final_answer` := `neutralized`
    Finalize { verified: bool },
    /// Append query and answer to `history`
    ArchiveTurn,
}
