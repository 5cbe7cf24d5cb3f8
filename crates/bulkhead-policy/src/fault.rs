//! Fault taxonomy routed through containment.
//!
//! Nine kinds cover the framework taxonomy the interaction port maps to
//! suggested actions. Anything outside the taxonomy is normalized to
//! [`Fault::Unknown`] before classification, so the decision path never
//! sees an unrecognized error value.

use serde::{Deserialize, Serialize};

use crate::category::ContainmentCategory;

/// A recognized fault routed through the containment engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Fault {
    /// Internal framework or context failure.
    #[error("context fault: {0}")]
    Context(String),
    /// Client-level failure local to one client instance.
    #[error("client fault: {0}")]
    Client(String),
    /// Navigation or routing failure.
    #[error("navigation fault: {0}")]
    Navigation(String),
    /// Persistence-layer failure.
    #[error("persistence fault: {0}")]
    Persistence(String),
    /// Input or state validation failure.
    #[error("validation fault: {0}")]
    Validation(String),
    /// Capability or permission failure.
    #[error("capability fault: {0}")]
    Capability(String),
    /// Device or infrastructure failure.
    #[error("device fault: {0}")]
    Device(String),
    /// Network or connectivity failure.
    #[error("network fault: {0}")]
    Network(String),
    /// Unrecognized failure normalized into the taxonomy.
    #[error("unknown fault: {0}")]
    Unknown(String),
}

impl Fault {
    /// Normalize an arbitrary error into the fault taxonomy.
    ///
    /// A `Fault` travels through unchanged; any other error value becomes
    /// [`Fault::Unknown`] carrying the error's display text.
    #[must_use]
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        match error.downcast_ref::<Self>() {
            Some(fault) => fault.clone(),
            None => Self::Unknown(error.to_string()),
        }
    }

    /// The containment category this fault classifies into.
    ///
    /// Total and pure: every kind maps to exactly one category.
    #[inline]
    #[must_use]
    pub const fn category(&self) -> ContainmentCategory {
        match self {
            Self::Network(_) => ContainmentCategory::Network,
            Self::Validation(_) => ContainmentCategory::Validation,
            Self::Capability(_) => ContainmentCategory::Authorization,
            Self::Persistence(_) => ContainmentCategory::DataIntegrity,
            Self::Context(_) | Self::Device(_) => ContainmentCategory::System,
            Self::Client(_) | Self::Navigation(_) | Self::Unknown(_) => {
                ContainmentCategory::Unknown
            }
        }
    }

    /// Kind name used in serialized form, log fields, and metrics labels.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Context(_) => "context",
            Self::Client(_) => "client",
            Self::Navigation(_) => "navigation",
            Self::Persistence(_) => "persistence",
            Self::Validation(_) => "validation",
            Self::Capability(_) => "capability",
            Self::Device(_) => "device",
            Self::Network(_) => "network",
            Self::Unknown(_) => "unknown",
        }
    }

    /// The message carried by the fault.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Context(m)
            | Self::Client(m)
            | Self::Navigation(m)
            | Self::Persistence(m)
            | Self::Validation(m)
            | Self::Capability(m)
            | Self::Device(m)
            | Self::Network(m)
            | Self::Unknown(m) => m,
        }
    }
}
