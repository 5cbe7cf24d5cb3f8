//! Observer and fallback seams for boundary nodes.
//!
//! Observers never suppress a fault; they watch it go by. Whether the fault
//! is absorbed is decided by the recovery strategy of its containment
//! category, and what the client is told to do is decided upstream by the
//! coordinator.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use bulkhead_policy::Fault;

/// A handler attached to a boundary node.
///
/// Both composition handlers and the primary handler implement this one
/// fixed-method interface. Every attached observer is invoked
/// unconditionally for every fault contained at its node.
#[async_trait]
pub trait FaultObserver: Send + Sync {
    /// Observe a fault contained at the attached boundary.
    async fn observe(&self, fault: &Fault);

    /// Name used in log fields.
    fn name(&self) -> &str {
        "observer"
    }
}

/// The command value executed when a boundary halts or falls back.
///
/// Cloneable so it can travel to the UI executor as a message; the wrapped
/// routine runs only there.
#[derive(Clone)]
pub struct FallbackAction {
    label: String,
    run: Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>,
}

impl FallbackAction {
    /// Wrap an async routine as a fallback command.
    pub fn new<F, Fut>(label: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            label: label.into(),
            run: Arc::new(move || Box::pin(run())),
        }
    }

    /// Fallback that does nothing when invoked.
    #[must_use]
    pub fn noop() -> Self {
        Self::new("noop", || async {})
    }

    /// Label used in log fields.
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run the wrapped routine to completion.
    pub async fn run(&self) {
        (self.run)().await;
    }
}

impl Default for FallbackAction {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for FallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
