//! Closed intent set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version of the intent set.
///
/// Bumped whenever a variant is added, removed or its meaning changes, so
/// cached responses produced under an older classification are never served.
pub const INTENT_SET_VERSION: u32 = 1;

/// Purpose of a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// General hospital information (departments, doctors, hours, location).
    InfoQuery,
    /// Symptom description looking for a department or guidance.
    SymptomQuery,
    /// Reservation lookup, booking, change or cancellation.
    ReservationQuery,
    /// Nothing recognizable.
    Fallback,
}

impl Intent {
    /// All intents in classification priority order.
    pub const ALL: [Self; 4] = [
        Self::ReservationQuery,
        Self::SymptomQuery,
        Self::InfoQuery,
        Self::Fallback,
    ];

    /// Wire name of the intent.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InfoQuery => "info_query",
            Self::SymptomQuery => "symptom_query",
            Self::ReservationQuery => "reservation_query",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|intent| intent.as_str() == s)
            .ok_or_else(|| format!("unknown intent: {s}"))
    }
}
