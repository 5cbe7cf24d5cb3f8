//! The boundary coordinator actor: violation decisions and execution.
//!
//! One spawned worker task owns the boundary tree, the severity index, and
//! the violation ledger; every operation travels to it as a command with a
//! oneshot reply. Decisions run in four steps:
//!
//! - record the violation and check its frequency (circuit breaker)
//! - ask the interaction port for a suggestion, bounded by a deadline
//! - adjust the suggestion by boundary severity
//! - execute the action, escalating to a higher-severity boundary if asked
//!
//! Escalation recurses inside the worker; it never sends itself commands,
//! so a decision can always run to completion while the command queue
//! waits. The worker awaits only the UI executor and the registry worker,
//! neither of which ever waits on the coordinator, so the actors cannot
//! deadlock.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use bulkhead_boundary::{BoundaryError, BoundaryId, BoundarySpec, BoundaryTree, FaultObserver};
use bulkhead_policy::{Action, Fault, Severity};
use bulkhead_registry::{PropagationRegistry, SourceId, ViolationRouter};

use crate::config::ContainmentConfig;
use crate::error::CoordinatorError;
use crate::ledger::{Violation, ViolationLedger};
use crate::port::StaticInteractionPort;
use crate::ui::UiExecutor;

/// Executed decisions, by action kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounts {
    /// Boundaries halted.
    pub halts: u64,
    /// Retries handed back to clients.
    pub retries: u64,
    /// Violations waved through.
    pub continues: u64,
    /// Decisions moved to a higher-severity boundary.
    pub escalations: u64,
    /// Fallbacks presented without a full halt.
    pub fallbacks: u64,
}

impl ActionCounts {
    /// Sum across all action kinds.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.halts + self.retries + self.continues + self.escalations + self.fallbacks
    }

    fn record(&mut self, action: Action) {
        match action {
            Action::Halt => self.halts += 1,
            Action::Retry => self.retries += 1,
            Action::Continue => self.continues += 1,
            Action::Escalate => self.escalations += 1,
            Action::Fallback => self.fallbacks += 1,
        }
    }
}

/// Point-in-time counters for the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    /// Boundaries currently managed.
    pub boundaries: usize,
    /// Violations appended to the ledger.
    pub violations_recorded: u64,
    /// Circuit breaker activations.
    pub breaker_trips: u64,
    /// Executed decisions, by action kind.
    pub actions: ActionCounts,
}

pub(crate) enum CoordinatorCommand {
    CreateBoundary {
        spec: BoundarySpec,
        reply: oneshot::Sender<Result<BoundaryId, CoordinatorError>>,
    },
    AddHandler {
        boundary: BoundaryId,
        handler: Arc<dyn FaultObserver>,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },
    AttachClient {
        boundary: BoundaryId,
        source: SourceId,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },
    DetachClient {
        boundary: BoundaryId,
        source: SourceId,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },
    HandleViolation {
        boundary: BoundaryId,
        fault: Fault,
        reply: oneshot::Sender<Result<Action, CoordinatorError>>,
    },
    Cleanup {
        boundary: BoundaryId,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },
    RemoveBoundary {
        boundary: BoundaryId,
        unregister_scope: bool,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },
    Violations {
        boundary: BoundaryId,
        reply: oneshot::Sender<Vec<Violation>>,
    },
    Stats {
        reply: oneshot::Sender<CoordinatorStats>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct CoordinatorWorker {
    rx: mpsc::Receiver<CoordinatorCommand>,
    config: ContainmentConfig,
    tree: BoundaryTree,
    severity_index: BTreeMap<Severity, BTreeSet<BoundaryId>>,
    ledger: ViolationLedger,
    registry: PropagationRegistry,
    ui: UiExecutor,
    stats: CoordinatorStats,
}

impl CoordinatorWorker {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            if self.handle(command).await {
                break;
            }
        }
        tracing::debug!("coordinator worker stopped");
    }

    /// Apply one command. Returns `true` when the worker should stop.
    async fn handle(&mut self, command: CoordinatorCommand) -> bool {
        match command {
            CoordinatorCommand::CreateBoundary { spec, reply } => {
                let _ = reply.send(self.create_boundary(spec).await);
            }
            CoordinatorCommand::AddHandler {
                boundary,
                handler,
                reply,
            } => {
                let _ = reply.send(self.tree.add_handler(&boundary, handler).map_err(Into::into));
            }
            CoordinatorCommand::AttachClient {
                boundary,
                source,
                reply,
            } => {
                let _ = reply.send(self.attach_client(&boundary, source).await);
            }
            CoordinatorCommand::DetachClient {
                boundary,
                source,
                reply,
            } => {
                let _ = reply.send(self.detach_client(&boundary, &source).await);
            }
            CoordinatorCommand::HandleViolation {
                boundary,
                fault,
                reply,
            } => {
                let _ = reply.send(self.handle_violation(&boundary, &fault).await);
            }
            CoordinatorCommand::Cleanup { boundary, reply } => {
                let _ = reply.send(self.tree.cleanup(&boundary).map_err(Into::into));
            }
            CoordinatorCommand::RemoveBoundary {
                boundary,
                unregister_scope,
                reply,
            } => {
                let _ = reply.send(self.remove_boundary(&boundary, unregister_scope).await);
            }
            CoordinatorCommand::Violations { boundary, reply } => {
                let _ = reply.send(self.ledger.history(&boundary));
            }
            CoordinatorCommand::Stats { reply } => {
                let _ = reply.send(self.stats);
            }
            CoordinatorCommand::Shutdown { reply } => {
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    async fn create_boundary(&mut self, spec: BoundarySpec) -> Result<BoundaryId, CoordinatorError> {
        let id = self.tree.insert(spec)?;
        let (scope, severity) = {
            let node = self.require(&id)?;
            (node.scope().to_string(), node.severity())
        };
        if let Err(error) = self.registry.register(scope.as_str(), id.clone()).await {
            // Keep the tree consistent with the registry.
            let _ = self.tree.remove(&id);
            return Err(error.into());
        }
        self.severity_index
            .entry(severity)
            .or_default()
            .insert(id.clone());
        self.stats.boundaries = self.tree.len();
        tracing::info!(boundary = %id, severity = %severity, scope = %scope, "boundary created");
        Ok(id)
    }

    async fn attach_client(
        &mut self,
        boundary: &BoundaryId,
        source: SourceId,
    ) -> Result<(), CoordinatorError> {
        let scope = self.require(boundary)?.scope().to_string();
        self.tree.attach_source(boundary, source.as_str())?;
        self.registry.associate(source.clone(), scope.as_str()).await?;
        tracing::debug!(boundary = %boundary, source = %source, "client attached");
        Ok(())
    }

    async fn detach_client(
        &mut self,
        boundary: &BoundaryId,
        source: &SourceId,
    ) -> Result<(), CoordinatorError> {
        self.tree.detach_source(boundary, source.as_str())?;
        self.registry.dissociate(source.clone()).await?;
        tracing::debug!(boundary = %boundary, source = %source, "client detached");
        Ok(())
    }

    async fn remove_boundary(
        &mut self,
        boundary: &BoundaryId,
        unregister_scope: bool,
    ) -> Result<(), CoordinatorError> {
        if unregister_scope {
            let scope = self.require(boundary)?.scope().to_string();
            self.registry.unregister(scope.as_str()).await?;
        }
        let node = self.tree.remove(boundary)?;
        if let Some(bucket) = self.severity_index.get_mut(&node.severity()) {
            bucket.remove(boundary);
            if bucket.is_empty() {
                self.severity_index.remove(&node.severity());
            }
        }
        self.stats.boundaries = self.tree.len();
        tracing::info!(boundary = %boundary, "boundary removed");
        Ok(())
    }

    /// Local containment pass followed by the coordinated decision.
    ///
    /// The containment walk runs the boundary's observers and recovery
    /// strategies; its verdict is recorded but the coordinated decision is
    /// authoritative either way.
    async fn handle_violation(
        &mut self,
        boundary: &BoundaryId,
        fault: &Fault,
    ) -> Result<Action, CoordinatorError> {
        let containment = self.tree.contain(boundary, fault).await?;
        tracing::debug!(
            boundary = %boundary,
            fault = fault.kind(),
            absorbed = containment.is_absorbed(),
            "local containment pass"
        );
        self.decide_and_execute(boundary, fault).await
    }

    /// Record, decide, adjust, execute. Boxed because escalation recurses.
    fn decide_and_execute<'a>(
        &'a mut self,
        boundary: &'a BoundaryId,
        fault: &'a Fault,
    ) -> BoxFuture<'a, Result<Action, CoordinatorError>> {
        Box::pin(async move {
            let severity = self.require(boundary)?.severity();
            let now = Utc::now();
            self.ledger.append(Violation {
                boundary: boundary.clone(),
                fault: fault.clone(),
                severity,
                at: now,
            });
            self.stats.violations_recorded += 1;
            metrics::counter!("bulkhead_violations_total").increment(1);

            let recent = self.ledger.recent_count(boundary, now);
            let action = if recent > self.config.trip_threshold {
                self.stats.breaker_trips += 1;
                metrics::counter!("bulkhead_breaker_trips_total").increment(1);
                let forced = if severity >= Severity::Error {
                    Action::Halt
                } else {
                    Action::Escalate
                };
                tracing::warn!(
                    boundary = %boundary,
                    recent,
                    threshold = self.config.trip_threshold,
                    action = %forced,
                    "circuit breaker tripped"
                );
                forced
            } else {
                let suggested = match self
                    .ui
                    .decide(fault.clone(), self.config.decision_timeout)
                    .await
                {
                    Some(action) => action,
                    None => {
                        tracing::warn!(
                            boundary = %boundary,
                            fault = fault.kind(),
                            "no interactive decision; using the static suggestion"
                        );
                        StaticInteractionPort::suggestion(fault)
                    }
                };
                adjust_for_severity(severity, suggested)
            };

            tracing::info!(
                boundary = %boundary,
                severity = %severity,
                fault = fault.kind(),
                action = %action,
                "violation decided"
            );
            self.execute(boundary, fault, action).await
        })
    }

    async fn execute(
        &mut self,
        boundary: &BoundaryId,
        fault: &Fault,
        action: Action,
    ) -> Result<Action, CoordinatorError> {
        let resolved = match action {
            Action::Halt | Action::Fallback => {
                self.present_fallback(boundary).await?;
                action
            }
            Action::Retry | Action::Continue => {
                // The client performs the retry; standing error UI is stale.
                self.ui.dismiss_error(boundary.clone()).await;
                action
            }
            Action::Escalate => {
                if let Some(higher) = self.escalation_target(boundary) {
                    tracing::info!(from = %boundary, to = %higher, "escalating violation");
                    self.decide_and_execute(&higher, fault).await?;
                    Action::Escalate
                } else {
                    tracing::warn!(
                        boundary = %boundary,
                        "no registered higher-severity boundary; halting in place"
                    );
                    self.present_fallback(boundary).await?;
                    Action::Halt
                }
            }
        };
        self.stats.actions.record(resolved);
        metrics::counter!("bulkhead_actions_total", "action" => resolved.as_str()).increment(1);
        Ok(resolved)
    }

    async fn present_fallback(&mut self, boundary: &BoundaryId) -> Result<(), CoordinatorError> {
        let fallback = self.require(boundary)?.fallback().clone();
        let acked = self
            .ui
            .run_fallback(boundary.clone(), fallback, self.config.fallback_timeout)
            .await;
        if !acked {
            tracing::warn!(boundary = %boundary, "fallback acknowledgement timed out");
        }
        Ok(())
    }

    /// The escalation target for `boundary`: the lowest severity bucket
    /// strictly above the current one that still holds a registered
    /// boundary, ties broken by id order. A boundary needs no attached
    /// sources to absorb an escalation; being registered is enough.
    fn escalation_target(&self, boundary: &BoundaryId) -> Option<BoundaryId> {
        let current = self.tree.node(boundary)?.severity();
        self.severity_index
            .range((Bound::Excluded(current), Bound::Unbounded))
            .flat_map(|(_, ids)| ids.iter())
            .next()
            .cloned()
    }

    fn require(&self, boundary: &BoundaryId) -> Result<&bulkhead_boundary::BoundaryNode, BoundaryError> {
        self.tree
            .node(boundary)
            .ok_or_else(|| BoundaryError::UnknownBoundary(boundary.clone()))
    }
}

/// Severity filter applied over a port suggestion.
///
/// Low-severity boundaries never interrupt, critical ones always halt, and
/// the middle band trims the extremes: warnings soften a halt into a
/// fallback, errors harden a continue into a retry.
const fn adjust_for_severity(severity: Severity, suggestion: Action) -> Action {
    match severity {
        Severity::Debug | Severity::Info => Action::Continue,
        Severity::Warning => match suggestion {
            Action::Halt => Action::Fallback,
            other => other,
        },
        Severity::Error => match suggestion {
            Action::Continue => Action::Retry,
            other => other,
        },
        Severity::Critical => Action::Halt,
    }
}

/// Cloneable handle to the coordinator worker.
#[derive(Debug, Clone)]
pub struct BoundaryCoordinator {
    tx: mpsc::Sender<CoordinatorCommand>,
}

impl BoundaryCoordinator {
    /// Create the command channel ahead of the worker, so the handle can be
    /// wired into the registry before the worker spawns.
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<CoordinatorCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Spawn the worker on the other end of [`BoundaryCoordinator::channel`].
    pub(crate) fn spawn_worker(
        rx: mpsc::Receiver<CoordinatorCommand>,
        config: ContainmentConfig,
        registry: PropagationRegistry,
        ui: UiExecutor,
    ) {
        let ledger = ViolationLedger::new(config.violation_window, config.ledger_retention);
        let worker = CoordinatorWorker {
            rx,
            config,
            tree: BoundaryTree::new(),
            severity_index: BTreeMap::new(),
            ledger,
            registry,
            ui,
            stats: CoordinatorStats::default(),
        };
        tokio::spawn(worker.run());
    }

    async fn send(&self, command: CoordinatorCommand) -> Result<(), CoordinatorError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Insert a boundary into the tree and register its scope for routing.
    ///
    /// # Errors
    /// - [`BoundaryError::DuplicateBoundary`] if the id is taken
    /// - [`BoundaryError::UnknownParent`] if the named parent is missing
    /// - [`CoordinatorError::ChannelClosed`] if a worker has stopped
    pub async fn create_boundary(&self, spec: BoundarySpec) -> Result<BoundaryId, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::CreateBoundary { spec, reply })
            .await?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Append a composition handler to a boundary's observer chain.
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the boundary is missing
    /// - [`CoordinatorError::ChannelClosed`] if the worker has stopped
    pub async fn add_handler(
        &self,
        boundary: impl Into<BoundaryId>,
        handler: Arc<dyn FaultObserver>,
    ) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::AddHandler {
            boundary: boundary.into(),
            handler,
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Attach a fault source to a boundary and associate it with the
    /// boundary's scope. Attaching an already-owned source moves it; the
    /// last attachment wins.
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the boundary is missing
    /// - [`CoordinatorError::ChannelClosed`] if a worker has stopped
    pub async fn attach_client(
        &self,
        boundary: impl Into<BoundaryId>,
        source: impl Into<SourceId>,
    ) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::AttachClient {
            boundary: boundary.into(),
            source: source.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Detach a fault source and drop its scope association.
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the boundary is missing
    /// - [`CoordinatorError::ChannelClosed`] if a worker has stopped
    pub async fn detach_client(
        &self,
        boundary: impl Into<BoundaryId>,
        source: impl Into<SourceId>,
    ) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::DetachClient {
            boundary: boundary.into(),
            source: source.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Run the full decision path for a violation at a boundary and return
    /// the executed action.
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the boundary is missing
    /// - [`CoordinatorError::ChannelClosed`] if the worker has stopped
    pub async fn handle_violation(
        &self,
        boundary: impl Into<BoundaryId>,
        fault: Fault,
    ) -> Result<Action, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::HandleViolation {
            boundary: boundary.into(),
            fault,
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Sever a boundary's links and handlers, leaving it in the tree.
    /// Idempotent.
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the boundary is missing
    /// - [`CoordinatorError::ChannelClosed`] if the worker has stopped
    pub async fn cleanup(&self, boundary: impl Into<BoundaryId>) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::Cleanup {
            boundary: boundary.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Remove a boundary from the tree and the severity index.
    ///
    /// The boundary's registry scope stays registered; dropping it is a
    /// separate, explicit step. [`ContainmentRuntime::retire_boundary`]
    /// composes the two.
    ///
    /// [`ContainmentRuntime::retire_boundary`]: crate::runtime::ContainmentRuntime::retire_boundary
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the boundary is missing
    /// - [`CoordinatorError::ChannelClosed`] if the worker has stopped
    pub async fn remove_boundary(
        &self,
        boundary: impl Into<BoundaryId>,
    ) -> Result<(), CoordinatorError> {
        self.remove_inner(boundary.into(), false).await
    }

    pub(crate) async fn retire(&self, boundary: BoundaryId) -> Result<(), CoordinatorError> {
        self.remove_inner(boundary, true).await
    }

    async fn remove_inner(
        &self,
        boundary: BoundaryId,
        unregister_scope: bool,
    ) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::RemoveBoundary {
            boundary,
            unregister_scope,
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Retained violation history for a boundary, oldest first. Empty for
    /// unknown boundaries.
    ///
    /// # Errors
    /// - [`CoordinatorError::ChannelClosed`] if the worker has stopped
    pub async fn violations(
        &self,
        boundary: impl Into<BoundaryId>,
    ) -> Result<Vec<Violation>, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::Violations {
            boundary: boundary.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Point-in-time coordinator counters.
    ///
    /// # Errors
    /// - [`CoordinatorError::ChannelClosed`] if the worker has stopped
    pub async fn stats(&self) -> Result<CoordinatorStats, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::Stats { reply }).await?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Stop the worker after it drains queued commands.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .send(CoordinatorCommand::Shutdown { reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

#[async_trait]
impl ViolationRouter for BoundaryCoordinator {
    /// Routing is total: a violation that cannot be decided, because the
    /// boundary vanished or the worker stopped, degrades to a halt rather
    /// than an error.
    async fn route(&self, boundary: &BoundaryId, fault: &Fault, source: &SourceId) -> Action {
        match self.handle_violation(boundary.clone(), fault.clone()).await {
            Ok(action) => action,
            Err(error) => {
                tracing::error!(
                    boundary = %boundary,
                    source = %source,
                    %error,
                    "violation could not be decided; halting"
                );
                Action::Halt
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_severities_always_continue() {
        for suggestion in [
            Action::Halt,
            Action::Retry,
            Action::Continue,
            Action::Escalate,
            Action::Fallback,
        ] {
            assert_eq!(
                adjust_for_severity(Severity::Debug, suggestion),
                Action::Continue
            );
            assert_eq!(
                adjust_for_severity(Severity::Info, suggestion),
                Action::Continue
            );
        }
    }

    #[test]
    fn warning_softens_halt_to_fallback() {
        assert_eq!(
            adjust_for_severity(Severity::Warning, Action::Halt),
            Action::Fallback
        );
        assert_eq!(
            adjust_for_severity(Severity::Warning, Action::Retry),
            Action::Retry
        );
        assert_eq!(
            adjust_for_severity(Severity::Warning, Action::Escalate),
            Action::Escalate
        );
    }

    #[test]
    fn error_hardens_continue_to_retry() {
        assert_eq!(
            adjust_for_severity(Severity::Error, Action::Continue),
            Action::Retry
        );
        assert_eq!(
            adjust_for_severity(Severity::Error, Action::Halt),
            Action::Halt
        );
        assert_eq!(
            adjust_for_severity(Severity::Error, Action::Fallback),
            Action::Fallback
        );
    }

    #[test]
    fn critical_always_halts() {
        for suggestion in [
            Action::Halt,
            Action::Retry,
            Action::Continue,
            Action::Escalate,
            Action::Fallback,
        ] {
            assert_eq!(
                adjust_for_severity(Severity::Critical, suggestion),
                Action::Halt
            );
        }
    }

    #[test]
    fn action_counts_tally_by_kind() {
        let mut counts = ActionCounts::default();
        counts.record(Action::Halt);
        counts.record(Action::Retry);
        counts.record(Action::Retry);
        counts.record(Action::Escalate);
        assert_eq!(counts.halts, 1);
        assert_eq!(counts.retries, 2);
        assert_eq!(counts.escalations, 1);
        assert_eq!(counts.continues, 0);
        assert_eq!(counts.total(), 4);
    }
}
