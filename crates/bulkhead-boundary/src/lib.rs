//! Bulkhead boundary tree
//!
//! Containment structure for faults raised by running clients:
//! - [`BoundaryNode`]: one containment zone with a severity, a fallback, and
//!   an ordered observer chain
//! - [`BoundaryTree`]: arena of nodes linked by id references; parent/child
//!   links form a tree by construction
//! - [`FaultObserver`]: the single handler interface observers implement
//! - [`FallbackAction`]: the command value executed when a boundary halts
//!
//! Local containment ([`BoundaryTree::contain`]) walks the parent chain,
//! running observers and applying each category's default strategy. It is a
//! pre-filter: the coordinator's decision remains authoritative for what the
//! client is told to do.

pub mod error;
pub mod handler;
pub mod node;
pub mod tree;

pub use error::BoundaryError;
pub use handler::{FallbackAction, FaultObserver};
pub use node::{BoundaryId, BoundaryNode, BoundarySpec};
pub use tree::{BoundaryTree, Containment};
