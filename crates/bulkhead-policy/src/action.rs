//! Coordinator decision outcomes.

use serde::{Deserialize, Serialize};

/// Outcome of a containment decision.
///
/// Produced only by the coordinator's decision step. Clients act on
/// `Retry`/`Continue` themselves; `Halt`, `Fallback`, and `Escalate` drive
/// boundary-level effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Stop the failing unit and present its fallback.
    Halt,
    /// The client should retry the failed operation.
    Retry,
    /// Proceed as if the violation had not happened.
    Continue,
    /// Hand the violation to a higher-severity boundary.
    Escalate,
    /// Swap the failing unit for its fallback without halting.
    Fallback,
}

impl Action {
    /// Lowercase name used in serialized form, log fields, and metrics labels.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::Retry => "retry",
            Self::Continue => "continue",
            Self::Escalate => "escalate",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
