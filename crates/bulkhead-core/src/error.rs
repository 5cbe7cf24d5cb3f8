//! Coordinator-facing error types.

use bulkhead_boundary::BoundaryError;
use bulkhead_registry::RegistryError;

/// Errors surfaced by coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// The boundary tree rejected the operation.
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
    /// The propagation registry refused or is gone.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The coordinator worker has stopped.
    #[error("coordinator channel closed")]
    ChannelClosed,
}
