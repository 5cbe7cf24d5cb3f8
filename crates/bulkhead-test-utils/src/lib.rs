//! Testing utilities for the bulkhead workspace.
//!
//! Shared fixtures and recording doubles used across integration tests.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use bulkhead_core::{
    Action, BoundaryId, BoundarySpec, ContainmentConfig, ContainmentRuntime, Fault, FaultObserver,
    InteractionPort, Severity,
};

/// Interaction port double that records every call.
///
/// Suggestions come from a finite script first, then from the fixed
/// default once the script is exhausted.
pub struct RecordingPort {
    default: Action,
    script: Mutex<VecDeque<Action>>,
    decided: Mutex<Vec<Fault>>,
    presented: Mutex<Vec<BoundaryId>>,
    dismissed: Mutex<Vec<BoundaryId>>,
}

impl RecordingPort {
    pub fn suggesting(default: Action) -> Arc<Self> {
        Self::scripted(default, [])
    }

    pub fn scripted(default: Action, script: impl IntoIterator<Item = Action>) -> Arc<Self> {
        Arc::new(Self {
            default,
            script: Mutex::new(script.into_iter().collect()),
            decided: Mutex::new(Vec::new()),
            presented: Mutex::new(Vec::new()),
            dismissed: Mutex::new(Vec::new()),
        })
    }

    pub fn decided(&self) -> Vec<Fault> {
        self.decided.lock().clone()
    }

    pub fn decide_count(&self) -> usize {
        self.decided.lock().len()
    }

    pub fn presented(&self) -> Vec<BoundaryId> {
        self.presented.lock().clone()
    }

    pub fn dismissed(&self) -> Vec<BoundaryId> {
        self.dismissed.lock().clone()
    }
}

#[async_trait]
impl InteractionPort for RecordingPort {
    async fn show_error_boundary(&self, fault: &Fault) -> Action {
        self.decided.lock().push(fault.clone());
        self.script.lock().pop_front().unwrap_or(self.default)
    }

    async fn present_fallback_ui(&self, boundary: &BoundaryId) {
        self.presented.lock().push(boundary.clone());
    }

    async fn dismiss_error_ui(&self, boundary: &BoundaryId) {
        self.dismissed.lock().push(boundary.clone());
    }
}

/// Fault observer that counts how often it ran.
#[derive(Default)]
pub struct CountingObserver {
    hits: AtomicUsize,
}

impl CountingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaultObserver for CountingObserver {
    async fn observe(&self, _fault: &Fault) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Boundary ids of the standard three-tier fixture tree.
#[derive(Debug, Clone)]
pub struct ThreeTier {
    pub app: BoundaryId,
    pub session: BoundaryId,
    pub widget: BoundaryId,
}

/// Defaults tightened so tests never sit out a five-second deadline.
pub fn quick_config() -> ContainmentConfig {
    ContainmentConfig::new()
        .with_decision_timeout(Duration::from_millis(200))
        .with_fallback_timeout(Duration::from_millis(200))
}

/// Runtime with app (critical) / session (error) / widget (warning)
/// boundaries already created. Tests attach clients where they need one.
pub async fn three_tier_runtime(
    config: ContainmentConfig,
    port: Arc<dyn InteractionPort>,
) -> (ContainmentRuntime, ThreeTier) {
    let runtime = ContainmentRuntime::new(config, port).unwrap();
    let coordinator = runtime.coordinator();
    let app = coordinator
        .create_boundary(BoundarySpec::new("app", Severity::Critical))
        .await
        .unwrap();
    let session = coordinator
        .create_boundary(BoundarySpec::new("session", Severity::Error).with_parent("app"))
        .await
        .unwrap();
    let widget = coordinator
        .create_boundary(BoundarySpec::new("widget", Severity::Warning).with_parent("session"))
        .await
        .unwrap();

    (
        runtime,
        ThreeTier {
            app,
            session,
            widget,
        },
    )
}
