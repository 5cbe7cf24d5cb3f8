//! Bulkhead propagation registry
//!
//! Routing layer between failing clients and boundaries:
//! - [`PropagationRegistry`]: cloneable handle to the single-writer worker
//!   owning the source and scope maps
//! - [`ViolationRouter`]: the seam the coordinator implements; the registry
//!   resolves, the router decides
//! - [`UnhandledSink`]: where unroutable faults go instead of crashing
//! - [`SourceId`] / [`ScopeId`]: the two identifier spaces the maps connect
//!
//! Concurrent callers serialize on the worker task, so no caller ever
//! observes a half-updated map and per-source updates apply in arrival
//! order. The registry is an explicitly constructed object threaded through
//! dependency injection; there is no process-global instance.

pub mod error;
pub mod id;
pub mod registry;
pub mod router;
pub mod sink;

pub use error::RegistryError;
pub use id::{ScopeId, SourceId};
pub use registry::{PropagationRegistry, RegistrySnapshot};
pub use router::{Delivery, ViolationRouter};
pub use sink::{TracingSink, UnhandledReport, UnhandledSink, UnroutedReason};
