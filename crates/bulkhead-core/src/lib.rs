//! Bulkhead core: the coordinated containment runtime.
//!
//! Ties the workspace together:
//! - builds the boundary tree and keeps it registered for fault routing
//! - records violations in a trailing-window ledger
//! - decides each violation through a circuit breaker, an interaction
//!   port, and a severity filter
//! - executes decisions, escalating to higher-severity boundaries when
//!   local recovery is not enough
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bulkhead_core::{
//!     BoundarySpec, ContainmentConfig, ContainmentRuntime, Fault, Severity, SourceId,
//!     StaticInteractionPort,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = ContainmentRuntime::new(
//!     ContainmentConfig::new(),
//!     Arc::new(StaticInteractionPort),
//! )?;
//!
//! let app = runtime
//!     .coordinator()
//!     .create_boundary(BoundarySpec::new("app", Severity::Critical))
//!     .await?;
//! runtime.coordinator().attach_client(app, "client-1").await?;
//!
//! let delivery = runtime
//!     .registry()
//!     .propagate(
//!         Fault::Network("connection reset".into()),
//!         &SourceId::new("client-1"),
//!     )
//!     .await;
//! println!("decided: {:?}", delivery.action());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod port;
pub mod runtime;
pub mod ui;

pub use config::{ConfigError, ContainmentConfig};
pub use coordinator::{ActionCounts, BoundaryCoordinator, CoordinatorStats};
pub use error::CoordinatorError;
pub use ledger::{Violation, ViolationLedger};
pub use port::{InteractionPort, StaticInteractionPort};
pub use runtime::ContainmentRuntime;
pub use ui::{UiCommand, UiExecutor};

pub use bulkhead_boundary::{
    BoundaryError, BoundaryId, BoundarySpec, BoundaryTree, Containment, FallbackAction,
    FaultObserver,
};
pub use bulkhead_policy::{Action, ContainmentCategory, Fault, RecoveryStrategy, Severity};
pub use bulkhead_registry::{
    Delivery, PropagationRegistry, RegistrySnapshot, ScopeId, SourceId, TracingSink,
    UnhandledReport, UnhandledSink, UnroutedReason, ViolationRouter,
};

/// Common imports for building against the containment runtime.
pub mod prelude {
    //! One-line import for the usual working set.
    pub use crate::{
        Action, BoundaryCoordinator, BoundaryId, BoundarySpec, ContainmentConfig,
        ContainmentRuntime, Fault, FallbackAction, InteractionPort, PropagationRegistry, Severity,
        SourceId, StaticInteractionPort, Violation,
    };
}

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
