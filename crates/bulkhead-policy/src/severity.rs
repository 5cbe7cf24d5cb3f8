//! Violation severity ordering.
//!
//! Severity is a fixed total order (`Debug < Info < Warning < Error <
//! Critical`). Containment decisions compare severities with `>=`, so the
//! derived ordering is load-bearing: variants must stay declared in
//! ascending order.

use serde::{Deserialize, Serialize};

/// Severity of a boundary or of a violation it contains.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Diagnostic-only events.
    Debug,
    /// Informational events.
    Info,
    /// Degraded but operable.
    Warning,
    /// Operation failed; recovery expected.
    Error,
    /// Containment of last resort.
    Critical,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Self; 5] = [
        Self::Debug,
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    /// Lowercase name used in serialized form and log fields.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Tracing level for events logged at this severity.
    ///
    /// `tracing` has no level above `ERROR`, so `Critical` maps to `ERROR`.
    #[inline]
    #[must_use]
    pub const fn as_tracing_level(self) -> tracing::Level {
        match self {
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error | Self::Critical => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
