//! Error types for boundary tree operations.

use crate::node::BoundaryId;

/// Errors surfaced by [`crate::BoundaryTree`] operations.
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    /// Referenced boundary id is not in the arena.
    #[error("boundary not found: {0}")]
    UnknownBoundary(BoundaryId),

    /// Insertion would reuse an existing boundary id.
    #[error("duplicate boundary id: {0}")]
    DuplicateBoundary(BoundaryId),

    /// Spec names a parent that is not in the arena.
    #[error("parent boundary not found: {0}")]
    UnknownParent(BoundaryId),
}
