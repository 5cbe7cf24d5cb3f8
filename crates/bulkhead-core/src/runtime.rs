//! Construction and wiring of a full containment runtime.

use std::sync::Arc;

use bulkhead_boundary::BoundaryId;
use bulkhead_registry::{PropagationRegistry, TracingSink, UnhandledSink};

use crate::config::{ConfigError, ContainmentConfig};
use crate::coordinator::BoundaryCoordinator;
use crate::error::CoordinatorError;
use crate::port::InteractionPort;
use crate::ui::UiExecutor;

/// A fully wired containment engine.
///
/// Owns handles to the three workers: the UI executor, the propagation
/// registry, and the boundary coordinator. Construction is explicit and
/// nothing is process-global; independent runtimes do not share state.
///
/// Wiring order matters: the coordinator's command channel is created
/// first so its handle can serve as the registry's router, and only then
/// is the coordinator worker spawned with the registry handle it needs
/// for scope maintenance.
#[derive(Debug, Clone)]
pub struct ContainmentRuntime {
    config: ContainmentConfig,
    registry: PropagationRegistry,
    coordinator: BoundaryCoordinator,
    ui: UiExecutor,
}

impl ContainmentRuntime {
    /// Start a runtime with the given port and the default tracing sink
    /// for unrouted faults.
    ///
    /// # Errors
    /// - [`ConfigError::Zero`] when the configuration is invalid
    pub fn new(
        config: ContainmentConfig,
        port: Arc<dyn InteractionPort>,
    ) -> Result<Self, ConfigError> {
        Self::with_sink(config, port, Arc::new(TracingSink::default()))
    }

    /// Start a runtime with an explicit unrouted-fault sink.
    ///
    /// # Errors
    /// - [`ConfigError::Zero`] when the configuration is invalid
    pub fn with_sink(
        config: ContainmentConfig,
        port: Arc<dyn InteractionPort>,
        sink: Arc<dyn UnhandledSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let ui = UiExecutor::spawn(port, config.channel_capacity);
        let (coordinator, commands) = BoundaryCoordinator::channel(config.channel_capacity);
        let registry = PropagationRegistry::spawn(
            Arc::new(coordinator.clone()),
            sink,
            config.channel_capacity,
        );
        BoundaryCoordinator::spawn_worker(
            commands,
            config.clone(),
            registry.clone(),
            ui.clone(),
        );
        tracing::info!(
            window = ?config.violation_window,
            threshold = config.trip_threshold,
            "containment runtime started"
        );
        Ok(Self {
            config,
            registry,
            coordinator,
            ui,
        })
    }

    /// The runtime's configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ContainmentConfig {
        &self.config
    }

    /// Handle to the propagation registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &PropagationRegistry {
        &self.registry
    }

    /// Handle to the boundary coordinator.
    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> &BoundaryCoordinator {
        &self.coordinator
    }

    /// Retire a boundary: unregister its scope, then remove it from the
    /// tree. In-flight propagations for the scope sink instead of routing
    /// to a boundary that no longer exists.
    ///
    /// # Errors
    /// - [`CoordinatorError::Boundary`] if the boundary is missing
    /// - [`CoordinatorError::ChannelClosed`] if a worker has stopped
    pub async fn retire_boundary(
        &self,
        boundary: impl Into<BoundaryId>,
    ) -> Result<(), CoordinatorError> {
        self.coordinator.retire(boundary.into()).await
    }

    /// Stop all three workers, coordinator first.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
        self.registry.shutdown().await;
        self.ui.shutdown().await;
        tracing::info!("containment runtime stopped");
    }
}
