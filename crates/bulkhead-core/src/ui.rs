//! Serialized execution of interaction-port work.
//!
//! Port calls must not run concurrently with each other; they model a
//! single user surface. One spawned executor task owns the port and
//! consumes [`UiCommand`] values in order. The coordinator talks to it
//! through the cloneable [`UiExecutor`] handle and bounds every wait with
//! a deadline, so a stalled surface degrades decisions instead of wedging
//! the engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use bulkhead_boundary::{BoundaryId, FallbackAction};
use bulkhead_policy::{Action, Fault};

use crate::port::InteractionPort;

/// Work items consumed by the UI executor task.
#[derive(Debug)]
pub enum UiCommand {
    /// Ask the port to suggest an action for a fault.
    Decide {
        /// The fault under decision.
        fault: Fault,
        /// Receives the port's suggestion.
        reply: oneshot::Sender<Action>,
    },
    /// Run a boundary's fallback command, then present fallback UI.
    RunFallback {
        /// The halted boundary.
        boundary: BoundaryId,
        /// The fallback to run before presentation.
        fallback: FallbackAction,
        /// Acknowledged once presentation finishes.
        done: oneshot::Sender<()>,
    },
    /// Dismiss any standing error UI for a boundary.
    DismissError {
        /// The recovering boundary.
        boundary: BoundaryId,
    },
    /// Stop the executor.
    Shutdown {
        /// Acknowledged just before the task exits.
        done: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the UI executor task.
#[derive(Debug, Clone)]
pub struct UiExecutor {
    tx: mpsc::Sender<UiCommand>,
}

impl UiExecutor {
    /// Spawn the executor task owning `port`.
    #[must_use]
    pub fn spawn(port: Arc<dyn InteractionPort>, channel_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(channel_capacity);
        tokio::spawn(run_ui(port, rx));
        Self { tx }
    }

    /// Ask the port for a suggestion, waiting at most `timeout`.
    ///
    /// Returns `None` when the executor is gone or the deadline passes; the
    /// caller falls back to a static suggestion.
    pub async fn decide(&self, fault: Fault, timeout: Duration) -> Option<Action> {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(UiCommand::Decide { fault, reply })
            .await
            .is_err()
        {
            return None;
        }
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(action)) => Some(action),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Run a fallback and present its UI, waiting at most `timeout` for the
    /// acknowledgement. Returns whether the acknowledgement arrived.
    pub async fn run_fallback(
        &self,
        boundary: BoundaryId,
        fallback: FallbackAction,
        timeout: Duration,
    ) -> bool {
        let (done, rx) = oneshot::channel();
        if self
            .tx
            .send(UiCommand::RunFallback {
                boundary,
                fallback,
                done,
            })
            .await
            .is_err()
        {
            return false;
        }
        matches!(tokio::time::timeout(timeout, rx).await, Ok(Ok(())))
    }

    /// Queue dismissal of any standing error UI. Fire and forget.
    pub async fn dismiss_error(&self, boundary: BoundaryId) {
        let _ = self.tx.send(UiCommand::DismissError { boundary }).await;
    }

    /// Stop the executor after it drains queued commands.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(UiCommand::Shutdown { done }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

async fn run_ui(port: Arc<dyn InteractionPort>, mut rx: mpsc::Receiver<UiCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            UiCommand::Decide { fault, reply } => {
                let action = port.show_error_boundary(&fault).await;
                let _ = reply.send(action);
            }
            UiCommand::RunFallback {
                boundary,
                fallback,
                done,
            } => {
                tracing::debug!(
                    boundary = %boundary,
                    fallback = fallback.label(),
                    "running fallback"
                );
                fallback.run().await;
                port.present_fallback_ui(&boundary).await;
                let _ = done.send(());
            }
            UiCommand::DismissError { boundary } => {
                port.dismiss_error_ui(&boundary).await;
            }
            UiCommand::Shutdown { done } => {
                let _ = done.send(());
                break;
            }
        }
    }
    tracing::debug!("ui executor stopped");
}
