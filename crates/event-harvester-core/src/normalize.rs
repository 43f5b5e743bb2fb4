//! Candidate → canonical event normalization.
//!
//! Values the model provided pass through unchanged except for the 24-hour
//! time repair below. Records that end up too incomplete are removed later
//! by the low-quality sweep (see [`crate::policy`]).

use crate::models::{CandidateEvent, CanonicalEvent};

/// Normalize one candidate event.
///
/// Empty strings become unknown. A known time whose third character is not
/// `:` gets a colon inserted at that position, so `"1930"` becomes `"19:30"`.
pub fn normalize(candidate: &CandidateEvent) -> CanonicalEvent {
    CanonicalEvent {
        date: known(&candidate.date),
        name: known(&candidate.name),
        time: known(&candidate.time).map(|t| repair_time(&t)),
        location: known(&candidate.location),
        description: known(&candidate.description),
        price: known(&candidate.price),
    }
}

fn known(field: &Option<String>) -> Option<String> {
    field.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Insert the missing `:` in an `HHMM`-style time.
///
/// Times shorter than three characters are returned unchanged.
pub fn repair_time(time: &str) -> String {
    match time.char_indices().nth(2) {
        Some((idx, c)) if c != ':' => format!("{}:{}", &time[..idx], &time[idx..]),
        _ => time.to_string(),
    }
}
