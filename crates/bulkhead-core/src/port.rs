//! The interaction port: where containment meets a user surface.

use async_trait::async_trait;

use bulkhead_boundary::BoundaryId;
use bulkhead_policy::{Action, Fault};

/// Pluggable decision surface consulted for non-tripped violations.
///
/// Implementations range from a real UI dialog to the non-interactive
/// [`StaticInteractionPort`]. The coordinator treats the returned action as
/// a suggestion and adjusts it by boundary severity; it also bounds every
/// call with a deadline, so a slow implementation degrades decisions rather
/// than stalling them.
#[async_trait]
pub trait InteractionPort: Send + Sync {
    /// Suggest an action for a fault.
    async fn show_error_boundary(&self, fault: &Fault) -> Action;

    /// Present fallback UI for a boundary that halted.
    async fn present_fallback_ui(&self, boundary: &BoundaryId);

    /// Dismiss any standing error UI for a boundary.
    async fn dismiss_error_ui(&self, boundary: &BoundaryId);
}

/// Non-interactive port backed by a fixed fault-kind table.
///
/// Used headless and as the degradation target when an interactive port
/// misses its decision deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticInteractionPort;

impl StaticInteractionPort {
    /// The table suggestion for a fault kind.
    #[must_use]
    pub const fn suggestion(fault: &Fault) -> Action {
        match fault {
            Fault::Validation(_)
            | Fault::Navigation(_)
            | Fault::Persistence(_)
            | Fault::Network(_) => Action::Retry,
            Fault::Context(_) | Fault::Device(_) | Fault::Unknown(_) => Action::Halt,
            Fault::Capability(_) => Action::Fallback,
            Fault::Client(_) => Action::Continue,
        }
    }
}

#[async_trait]
impl InteractionPort for StaticInteractionPort {
    async fn show_error_boundary(&self, fault: &Fault) -> Action {
        Self::suggestion(fault)
    }

    async fn present_fallback_ui(&self, boundary: &BoundaryId) {
        tracing::info!(boundary = %boundary, "fallback ui presented");
    }

    async fn dismiss_error_ui(&self, boundary: &BoundaryId) {
        tracing::debug!(boundary = %boundary, "error ui dismissed");
    }
}
