//! Person-count thresholds.
//!
//! | people | status  | tier       |
//! |--------|---------|------------|
//! | < 5    | unsafe  | critical   |
//! | 5..=10 | unsafe  | elevated   |
//! | > 10   | reject  | reject     |
//!
//! The thresholds are fixed and intentionally not configurable.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fewer people than this leaves a compartment without enough bystanders.
pub const CRITICAL_BELOW: u32 = 5;
/// More people than this is over capacity.
pub const REJECT_ABOVE: u32 = 10;

/// Class label the detector uses for people.
pub const PERSON_LABEL: &str = "person";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SafetyTier {
    /// Too few people; a constable is dispatched.
    Critical,
    /// Some people; a constable is requested.
    Elevated,
    /// Over capacity; the request is rejected.
    Reject,
}

impl SafetyTier {
    /// Label reported to clients. Both unsafe tiers share `"unsafe"`.
    pub fn status(self) -> &'static str {
        match self {
            SafetyTier::Critical | SafetyTier::Elevated => "unsafe",
            SafetyTier::Reject => "reject",
        }
    }

    pub fn message(self, people_count: u32) -> String {
        match self {
            SafetyTier::Critical => {
                format!("🚨 Unsafe: Only {people_count} person(s). Constable dispatched.")
            }
            SafetyTier::Elevated => {
                format!("⚠️ Unsafe: {people_count} people. Constable requested.")
            }
            SafetyTier::Reject => format!("❌ Crowded: {people_count} people. Request rejected."),
        }
    }
}

pub fn classify(people_count: u32) -> SafetyTier {
    if people_count < CRITICAL_BELOW {
        SafetyTier::Critical
    } else if people_count <= REJECT_ABOVE {
        SafetyTier::Elevated
    } else {
        SafetyTier::Reject
    }
}

/// Number of labels equal to [`PERSON_LABEL`], ignoring ASCII case.
pub fn count_people<'a, I>(labels: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    let count = labels
        .into_iter()
        .filter(|label| label.trim().eq_ignore_ascii_case(PERSON_LABEL))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}
