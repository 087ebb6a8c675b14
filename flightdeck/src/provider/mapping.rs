//! Provider state vocabulary tables.
//!
//! Each provider reports flight state in its own words; this table
//! translates them into the canonical [`StatusState`] set. The per-provider
//! vocabularies overlap almost entirely once case-folded, so a single
//! shared table covers all of them; a provider needing a word with a
//! different meaning would get its own table here. Unrecognized vocabulary
//! maps to `Unknown`, which the merge engine treats as "no information"
//! rather than a state change.

use crate::model::StatusState;

/// Vocabulary shared by most providers.
const GENERIC: &[(&str, StatusState)] = &[
    ("scheduled", StatusState::Scheduled),
    ("schedule", StatusState::Scheduled),
    ("plan", StatusState::Scheduled),
    ("planned", StatusState::Scheduled),
    ("active", StatusState::EnRoute),
    ("enroute", StatusState::EnRoute),
    ("en route", StatusState::EnRoute),
    ("en-route", StatusState::EnRoute),
    ("in air", StatusState::EnRoute),
    ("in-air", StatusState::EnRoute),
    ("airborne", StatusState::EnRoute),
    ("departed", StatusState::EnRoute),
    ("cruising", StatusState::EnRoute),
    ("landed", StatusState::Arrived),
    ("arrived", StatusState::Arrived),
    ("arrival", StatusState::Arrived),
    ("arrived_gate", StatusState::Arrived),
    ("cancelled", StatusState::Cancelled),
    ("canceled", StatusState::Cancelled),
    ("diverted", StatusState::Diverted),
];

/// Translate a provider's raw state string into the canonical set.
///
/// Matching is case-insensitive on the trimmed string. The canonical display
/// names themselves are accepted too, so round-tripping a stored state is a
/// no-op.
pub fn map_state(raw: Option<&str>) -> StatusState {
    let Some(raw) = raw else {
        return StatusState::Unknown;
    };
    let s = raw.trim().to_lowercase();
    if s.is_empty() || s == "unknown" || s == "n/a" || s == "na" {
        return StatusState::Unknown;
    }
    for (word, state) in GENERIC {
        if s == *word {
            return *state;
        }
    }
    StatusState::Unknown
}
