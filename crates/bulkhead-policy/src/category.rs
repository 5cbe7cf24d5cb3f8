//! Containment categories and their default strategies.
//!
//! Classification lives on [`Fault::category`]; this module owns the
//! category vocabulary and the category-to-strategy table applied at the
//! boundary layer. Both halves are total, pure functions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::severity::Severity;
use crate::strategy::RecoveryStrategy;

/// Containment category a fault classifies into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainmentCategory {
    /// Connectivity and transport failures.
    Network,
    /// Input or state validation failures.
    Validation,
    /// Capability and permission failures.
    Authorization,
    /// Persistence and data-corruption failures.
    DataIntegrity,
    /// Framework, context, and device failures.
    System,
    /// Everything the taxonomy does not recognize.
    Unknown,
}

impl ContainmentCategory {
    /// All categories.
    pub const ALL: [Self; 6] = [
        Self::Network,
        Self::Validation,
        Self::Authorization,
        Self::DataIntegrity,
        Self::System,
        Self::Unknown,
    ];

    /// Default recovery strategy applied at the boundary layer.
    ///
    /// Validation and system faults are the only ones that bubble to the
    /// parent boundary; every other category is absorbed in place.
    #[must_use]
    pub fn default_strategy(self) -> RecoveryStrategy {
        match self {
            Self::Network => RecoveryStrategy::retry(3, Duration::from_secs(2)),
            Self::Validation | Self::System => RecoveryStrategy::Fail,
            Self::Authorization => RecoveryStrategy::Log(Severity::Error),
            Self::DataIntegrity => RecoveryStrategy::Log(Severity::Critical),
            Self::Unknown => RecoveryStrategy::Log(Severity::Warning),
        }
    }

    /// Snake-case name used in log fields.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::DataIntegrity => "data_integrity",
            Self::System => "system",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ContainmentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
