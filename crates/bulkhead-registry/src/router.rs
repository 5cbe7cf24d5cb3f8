//! Routing seam between the registry and the decision engine.

use async_trait::async_trait;

use bulkhead_boundary::BoundaryId;
use bulkhead_policy::{Action, Fault};

use crate::id::SourceId;

/// Decides what happens to a fault the registry resolved to a boundary.
///
/// Implemented by the coordinator. Routing is total: an implementation must
/// always answer with an [`Action`], even when its own internals degrade.
#[async_trait]
pub trait ViolationRouter: Send + Sync {
    /// Decide the action for a fault raised by `source` inside `boundary`.
    async fn route(&self, boundary: &BoundaryId, fault: &Fault, source: &SourceId) -> Action;
}

/// Outcome of propagating one fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Delivery {
    /// The fault reached its boundary; the router decided this action.
    Handled(Action),
    /// No route existed; the fault went to the unhandled sink.
    Sunk,
}

impl Delivery {
    /// The decided action, if the fault was routed.
    #[inline]
    #[must_use]
    pub const fn action(self) -> Option<Action> {
        match self {
            Self::Handled(action) => Some(action),
            Self::Sunk => None,
        }
    }

    /// Whether the fault went to the unhandled sink.
    #[inline]
    #[must_use]
    pub const fn is_sunk(self) -> bool {
        matches!(self, Self::Sunk)
    }
}
