//! Sentinel parsing at the controller boundary.
//!
//! Control decisions embedded in free text are reduced to a small closed set
//! of signals here, so the state machine's transition logic stays decidable
//! and unit-testable independent of wording variations. Matching is
//! substring-based and case-insensitive; a reply carrying both a positive
//! token and its negation is ill-formed and reported as conflicting.

/// Token the planner emits when requirements are sufficient to start coding.
pub const READY_TOKEN: &str = "READY_TO_CODE";

/// Token the planner emits while requirements are still incomplete.
pub const NOT_READY_TOKEN: &str = "NEED_MORE_INFO";

/// Token the reviewer emits to accept the tested code unit.
pub const APPROVED_TOKEN: &str = "SOLUTION_APPROVED";

/// Token the reviewer emits to send the code back for another attempt.
pub const REVISE_TOKEN: &str = "NEEDS_REVISION";

/// Outcome of scanning a reply for one sentinel pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalReading {
    /// The positive token is present (possibly amid unrelated text).
    Present,
    /// Neither token, or only the negative token, is present.
    Absent,
    /// Both the positive token and its negation are present.
    Conflicting,
}

fn read_pair(text: &str, positive: &str, negative: &str) -> SignalReading {
    let haystack = text.to_lowercase();
    let has_positive = haystack.contains(&positive.to_lowercase());
    let has_negative = haystack.contains(&negative.to_lowercase());
    match (has_positive, has_negative) {
        (true, true) => SignalReading::Conflicting,
        (true, false) => SignalReading::Present,
        _ => SignalReading::Absent,
    }
}

/// Scan a planning reply for the ready-to-code signal.
pub fn read_ready(text: &str) -> SignalReading {
    read_pair(text, READY_TOKEN, NOT_READY_TOKEN)
}

/// Scan a review reply for the approval signal.
pub fn read_approval(text: &str) -> SignalReading {
    read_pair(text, APPROVED_TOKEN, REVISE_TOKEN)
}
