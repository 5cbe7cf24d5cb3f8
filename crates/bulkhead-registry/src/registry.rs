//! The propagation registry actor and its cloneable handle.
//!
//! One spawned worker task owns the source and scope maps; every operation
//! travels to it as a command with a oneshot reply. The worker itself never
//! awaits the router or the sink, so a busy decision engine cannot stall
//! map maintenance and the two actors cannot wait on each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use bulkhead_boundary::BoundaryId;
use bulkhead_policy::Fault;

use crate::error::RegistryError;
use crate::id::{ScopeId, SourceId};
use crate::router::{Delivery, ViolationRouter};
use crate::sink::{UnhandledReport, UnhandledSink, UnroutedReason};

/// Point-in-time view of the registry maps and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Registered scope count.
    pub scopes: usize,
    /// Associated source count.
    pub sources: usize,
    /// Faults resolved to a boundary.
    pub resolved: u64,
    /// Faults handed to the unhandled sink.
    pub sunk: u64,
}

enum RegistryCommand {
    Register {
        scope: ScopeId,
        boundary: BoundaryId,
        reply: oneshot::Sender<()>,
    },
    Unregister {
        scope: ScopeId,
        reply: oneshot::Sender<bool>,
    },
    Associate {
        source: SourceId,
        scope: ScopeId,
        reply: oneshot::Sender<()>,
    },
    Dissociate {
        source: SourceId,
        reply: oneshot::Sender<bool>,
    },
    Resolve {
        source: SourceId,
        reply: oneshot::Sender<Resolution>,
    },
    Snapshot {
        reply: oneshot::Sender<RegistrySnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

enum Resolution {
    Resolved { scope: ScopeId, boundary: BoundaryId },
    NoSource,
    NoBoundary { scope: ScopeId },
}

struct RegistryWorker {
    rx: mpsc::Receiver<RegistryCommand>,
    sources: HashMap<SourceId, ScopeId>,
    scopes: HashMap<ScopeId, BoundaryId>,
    resolved: u64,
    sunk: u64,
}

impl RegistryWorker {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            if self.handle(command) {
                break;
            }
        }
        tracing::debug!("propagation registry worker stopped");
    }

    /// Apply one command. Returns `true` when the worker should stop.
    fn handle(&mut self, command: RegistryCommand) -> bool {
        match command {
            RegistryCommand::Register {
                scope,
                boundary,
                reply,
            } => {
                if let Some(previous) = self.scopes.insert(scope.clone(), boundary.clone()) {
                    tracing::debug!(%scope, old = %previous, new = %boundary, "scope re-registered");
                } else {
                    tracing::debug!(%scope, %boundary, "scope registered");
                }
                let _ = reply.send(());
            }
            RegistryCommand::Unregister { scope, reply } => {
                let removed = self.scopes.remove(&scope).is_some();
                // Associations pointing at a dead scope go with it.
                self.sources.retain(|_, associated| associated != &scope);
                tracing::debug!(%scope, removed, "scope unregistered");
                let _ = reply.send(removed);
            }
            RegistryCommand::Associate {
                source,
                scope,
                reply,
            } => {
                if let Some(previous) = self.sources.insert(source.clone(), scope.clone()) {
                    if previous != scope {
                        tracing::debug!(%source, old = %previous, new = %scope, "source re-associated");
                    }
                } else {
                    tracing::debug!(%source, %scope, "source associated");
                }
                let _ = reply.send(());
            }
            RegistryCommand::Dissociate { source, reply } => {
                let removed = self.sources.remove(&source).is_some();
                tracing::debug!(%source, removed, "source dissociated");
                let _ = reply.send(removed);
            }
            RegistryCommand::Resolve { source, reply } => {
                let resolution = match self.sources.get(&source) {
                    None => {
                        self.sunk += 1;
                        Resolution::NoSource
                    }
                    Some(scope) => match self.scopes.get(scope) {
                        None => {
                            self.sunk += 1;
                            Resolution::NoBoundary {
                                scope: scope.clone(),
                            }
                        }
                        Some(boundary) => {
                            self.resolved += 1;
                            Resolution::Resolved {
                                scope: scope.clone(),
                                boundary: boundary.clone(),
                            }
                        }
                    },
                };
                let _ = reply.send(resolution);
            }
            RegistryCommand::Snapshot { reply } => {
                let _ = reply.send(RegistrySnapshot {
                    scopes: self.scopes.len(),
                    sources: self.sources.len(),
                    resolved: self.resolved,
                    sunk: self.sunk,
                });
            }
            RegistryCommand::Shutdown { reply } => {
                let _ = reply.send(());
                return true;
            }
        }
        false
    }
}

/// Cloneable handle to the propagation registry worker.
///
/// Routing seams are injected at spawn time: the [`ViolationRouter`]
/// decides routed faults, the [`UnhandledSink`] receives the rest.
#[derive(Clone)]
pub struct PropagationRegistry {
    tx: mpsc::Sender<RegistryCommand>,
    router: Arc<dyn ViolationRouter>,
    sink: Arc<dyn UnhandledSink>,
}

impl PropagationRegistry {
    /// Spawn the registry worker and return a handle to it.
    #[must_use]
    pub fn spawn(
        router: Arc<dyn ViolationRouter>,
        sink: Arc<dyn UnhandledSink>,
        channel_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(channel_capacity);
        let worker = RegistryWorker {
            rx,
            sources: HashMap::new(),
            scopes: HashMap::new(),
            resolved: 0,
            sunk: 0,
        };
        tokio::spawn(worker.run());
        Self { tx, router, sink }
    }

    /// Map a scope to the boundary serving it.
    ///
    /// Re-registering a scope overwrites the previous boundary.
    ///
    /// # Errors
    /// - [`RegistryError::ChannelClosed`] if the worker has stopped
    pub async fn register(
        &self,
        scope: impl Into<ScopeId>,
        boundary: impl Into<BoundaryId>,
    ) -> Result<(), RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Register {
                scope: scope.into(),
                boundary: boundary.into(),
                reply,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;
        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Drop a scope mapping along with every association pointing at it.
    ///
    /// Returns whether the scope was registered.
    ///
    /// # Errors
    /// - [`RegistryError::ChannelClosed`] if the worker has stopped
    pub async fn unregister(&self, scope: impl Into<ScopeId>) -> Result<bool, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Unregister {
                scope: scope.into(),
                reply,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;
        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Associate a source with a scope.
    ///
    /// A source maps to at most one scope; re-association overwrites, never
    /// merges. The last writer wins.
    ///
    /// # Errors
    /// - [`RegistryError::ChannelClosed`] if the worker has stopped
    pub async fn associate(
        &self,
        source: impl Into<SourceId>,
        scope: impl Into<ScopeId>,
    ) -> Result<(), RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Associate {
                source: source.into(),
                scope: scope.into(),
                reply,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;
        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Drop a source association. Returns whether one existed.
    ///
    /// # Errors
    /// - [`RegistryError::ChannelClosed`] if the worker has stopped
    pub async fn dissociate(&self, source: impl Into<SourceId>) -> Result<bool, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Dissociate {
                source: source.into(),
                reply,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;
        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Point-in-time counts for introspection.
    ///
    /// # Errors
    /// - [`RegistryError::ChannelClosed`] if the worker has stopped
    pub async fn snapshot(&self) -> Result<RegistrySnapshot, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Snapshot { reply })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;
        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Stop the worker after it drains queued commands.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(RegistryCommand::Shutdown { reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// Propagate a fault from a source toward its boundary.
    ///
    /// Resolution failures are harmless by contract: the fault goes to the
    /// unhandled sink and the call returns [`Delivery::Sunk`] instead of
    /// crashing or erroring.
    pub async fn propagate(&self, fault: Fault, source: &SourceId) -> Delivery {
        self.propagate_inner(fault, source, None).await
    }

    /// Propagate with caller-supplied context recorded alongside the fault.
    pub async fn propagate_with_metadata(
        &self,
        fault: Fault,
        source: &SourceId,
        metadata: serde_json::Value,
    ) -> Delivery {
        self.propagate_inner(fault, source, Some(metadata)).await
    }

    async fn propagate_inner(
        &self,
        fault: Fault,
        source: &SourceId,
        metadata: Option<serde_json::Value>,
    ) -> Delivery {
        if let Some(metadata) = &metadata {
            tracing::debug!(source = %source, fault = fault.kind(), %metadata, "fault context");
        }

        match self.resolve(source).await {
            Ok(Resolution::Resolved { scope, boundary }) => {
                metrics::counter!("bulkhead_propagations_total", "outcome" => "routed")
                    .increment(1);
                let action = self.router.route(&boundary, &fault, source).await;
                tracing::info!(
                    source = %source,
                    scope = %scope,
                    boundary = %boundary,
                    fault = fault.kind(),
                    action = %action,
                    "fault routed"
                );
                Delivery::Handled(action)
            }
            Ok(Resolution::NoSource) => {
                self.sink_fault(fault, source, UnroutedReason::UnknownSource)
                    .await
            }
            Ok(Resolution::NoBoundary { scope }) => {
                self.sink_fault(fault, source, UnroutedReason::UnknownScope(scope))
                    .await
            }
            Err(_) => {
                self.sink_fault(fault, source, UnroutedReason::RegistryStopped)
                    .await
            }
        }
    }

    async fn sink_fault(&self, fault: Fault, source: &SourceId, reason: UnroutedReason) -> Delivery {
        metrics::counter!("bulkhead_propagations_total", "outcome" => "sunk").increment(1);
        self.sink
            .record(UnhandledReport {
                source: source.clone(),
                fault,
                reason,
                at: Utc::now(),
            })
            .await;
        Delivery::Sunk
    }

    async fn resolve(&self, source: &SourceId) -> Result<Resolution, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Resolve {
                source: source.clone(),
                reply,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;
        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Run a failing operation with fault propagation as a side channel.
    ///
    /// On failure the error is normalized into a [`Fault`], propagated from
    /// `source`, and the original error is returned unchanged: containment
    /// never suppresses the caller-visible failure.
    pub async fn with_propagation<T, E, Fut>(
        &self,
        source: &SourceId,
        operation: Fut,
    ) -> Result<T, E>
    where
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        match operation.await {
            Ok(value) => Ok(value),
            Err(error) => {
                let fault = Fault::from_error(&error);
                let _ = self.propagate(fault, source).await;
                Err(error)
            }
        }
    }
}

impl fmt::Debug for PropagationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropagationRegistry").finish_non_exhaustive()
    }
}
