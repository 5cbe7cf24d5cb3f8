//! Bulkhead policy vocabulary
//!
//! Leaf types shared by every containment layer:
//! - [`Severity`]: totally ordered violation severity
//! - [`RecoveryStrategy`]: what a boundary does with a fault it absorbs
//! - [`Action`]: coordinator decision outcomes
//! - [`Fault`]: the recognized fault taxonomy routed through containment
//! - [`ContainmentCategory`]: classification driving default strategies
//!
//! Everything here is pure data. Classification and the default-strategy
//! table are total functions with no side effects; applying a strategy is
//! the job of the boundary layer.

pub mod action;
pub mod category;
pub mod fault;
pub mod severity;
pub mod strategy;

pub use action::Action;
pub use category::ContainmentCategory;
pub use fault::Fault;
pub use severity::Severity;
pub use strategy::{CustomRecovery, RecoveryStrategy};
