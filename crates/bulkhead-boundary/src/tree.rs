//! Arena of boundary nodes and the local containment walk.
//!
//! Nodes are stored in one ordered map keyed by [`BoundaryId`]; links are id
//! references into the arena. Links enter at construction only and cleanup
//! repairs both directions, so the walk in [`BoundaryTree::contain`] is
//! bounded by tree depth and never revisits a node.

use std::collections::BTreeMap;
use std::sync::Arc;

use bulkhead_policy::{Fault, RecoveryStrategy, Severity};

use crate::error::BoundaryError;
use crate::handler::FaultObserver;
use crate::node::{BoundaryId, BoundaryNode, BoundarySpec};

/// Outcome of a local containment walk.
#[derive(Debug, Clone)]
pub enum Containment {
    /// A boundary on the chain absorbed the fault.
    Absorbed {
        /// The absorbing boundary.
        by: BoundaryId,
        /// The strategy it applied.
        strategy: RecoveryStrategy,
    },
    /// Every boundary up to the root refused; the fault was not absorbed.
    Unabsorbed {
        /// The root boundary that saw the fault last.
        root: BoundaryId,
    },
}

impl Containment {
    /// Whether some boundary absorbed the fault.
    #[inline]
    #[must_use]
    pub const fn is_absorbed(&self) -> bool {
        matches!(self, Self::Absorbed { .. })
    }

    /// The absorbing boundary, if any.
    #[inline]
    #[must_use]
    pub const fn absorbed_by(&self) -> Option<&BoundaryId> {
        match self {
            Self::Absorbed { by, .. } => Some(by),
            Self::Unabsorbed { .. } => None,
        }
    }
}

/// Arena of boundary nodes linked into a tree.
#[derive(Debug, Default)]
pub struct BoundaryTree {
    nodes: BTreeMap<BoundaryId, BoundaryNode>,
}

impl BoundaryTree {
    /// Create an empty tree.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    /// Number of nodes in the arena.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a boundary is in the arena.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &BoundaryId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Read access to a node.
    #[inline]
    #[must_use]
    pub fn node(&self, id: &BoundaryId) -> Option<&BoundaryNode> {
        self.nodes.get(id)
    }

    /// All boundary ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &BoundaryId> {
        self.nodes.keys()
    }

    /// Insert a boundary described by `spec`.
    ///
    /// Rejects duplicate ids and unknown parents. The child link into the
    /// parent's set is made here and only here; nodes are never re-parented.
    ///
    /// # Errors
    /// - [`BoundaryError::DuplicateBoundary`] if the id is already present
    /// - [`BoundaryError::UnknownParent`] if the named parent is missing
    pub fn insert(&mut self, spec: BoundarySpec) -> Result<BoundaryId, BoundaryError> {
        if self.nodes.contains_key(spec.id()) {
            return Err(BoundaryError::DuplicateBoundary(spec.id().clone()));
        }
        if let Some(parent) = &spec.parent {
            if !self.nodes.contains_key(parent) {
                return Err(BoundaryError::UnknownParent(parent.clone()));
            }
        }

        let node = BoundaryNode::from_spec(spec);
        let id = node.id.clone();
        if let Some(parent) = node.parent.clone() {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.insert(id.clone());
            }
        }
        tracing::debug!(
            boundary = %id,
            severity = %node.severity,
            parent = ?node.parent,
            "boundary inserted"
        );
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Append a composition handler to a boundary's ordered chain.
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the boundary is missing
    pub fn add_handler(
        &mut self,
        id: &BoundaryId,
        handler: Arc<dyn FaultObserver>,
    ) -> Result<(), BoundaryError> {
        let node = self.require_mut(id)?;
        tracing::debug!(boundary = %id, handler = handler.name(), "composition handler added");
        node.handlers.push(handler);
        Ok(())
    }

    /// Record a source id as attached to a boundary.
    ///
    /// A source belongs to at most one node: attaching releases any claim a
    /// previous owner held, so the last attachment wins.
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the boundary is missing
    pub fn attach_source(
        &mut self,
        id: &BoundaryId,
        source: impl Into<String>,
    ) -> Result<(), BoundaryError> {
        if !self.nodes.contains_key(id) {
            return Err(BoundaryError::UnknownBoundary(id.clone()));
        }
        let source = source.into();
        for node in self.nodes.values_mut() {
            node.attached_sources.remove(&source);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.attached_sources.insert(source);
        }
        Ok(())
    }

    /// Remove a source id from a boundary's attached set.
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the boundary is missing
    pub fn detach_source(&mut self, id: &BoundaryId, source: &str) -> Result<(), BoundaryError> {
        let node = self.require_mut(id)?;
        node.attached_sources.remove(source);
        Ok(())
    }

    /// Walk the parent chain from `id`, observing and applying strategies
    /// until a boundary absorbs the fault.
    ///
    /// At each visited node the composition handlers run unconditionally,
    /// the primary handler runs if attached, the fault is classified, and
    /// the node's strategy for that category is applied. `Fail` hands the
    /// fault to the parent. The walk is bounded by tree depth because links
    /// are fixed at construction.
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the starting id is missing
    pub async fn contain(
        &self,
        id: &BoundaryId,
        fault: &Fault,
    ) -> Result<Containment, BoundaryError> {
        let mut current = self.require(id)?;
        loop {
            for handler in &current.handlers {
                handler.observe(fault).await;
            }
            if let Some(primary) = &current.primary {
                primary.observe(fault).await;
            }

            let category = fault.category();
            let strategy = current.strategy_for(category);
            apply_strategy(current, &strategy, fault).await;

            if strategy.absorbs() {
                tracing::debug!(
                    boundary = %current.id,
                    category = %category,
                    strategy = %strategy,
                    "fault absorbed"
                );
                return Ok(Containment::Absorbed {
                    by: current.id.clone(),
                    strategy,
                });
            }

            match &current.parent {
                Some(parent) => {
                    tracing::debug!(boundary = %current.id, parent = %parent, "fault handed to parent");
                    current = self.require(parent)?;
                }
                None => {
                    tracing::debug!(boundary = %current.id, "fault reached the root unabsorbed");
                    return Ok(Containment::Unabsorbed {
                        root: current.id.clone(),
                    });
                }
            }
        }
    }

    /// Sever a boundary's tree links, leaving the node in the arena.
    ///
    /// Unlinks from the parent's child set, clears the handler chain, and
    /// detaches children so no child holds a dangling parent reference.
    /// Idempotent: a second call finds nothing left to sever.
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the boundary is missing
    pub fn cleanup(&mut self, id: &BoundaryId) -> Result<(), BoundaryError> {
        let node = self.require_mut(id)?;
        let parent = node.parent.take();
        let children = std::mem::take(&mut node.children);
        node.handlers.clear();
        node.primary = None;

        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.children.remove(id);
            }
        }
        for child in &children {
            if let Some(child_node) = self.nodes.get_mut(child) {
                child_node.parent = None;
            }
        }

        tracing::debug!(
            boundary = %id,
            detached_children = children.len(),
            "boundary cleaned up"
        );
        Ok(())
    }

    /// Cleanup plus removal from the arena.
    ///
    /// Nothing is collected automatically; removal is an explicit lifecycle
    /// step. Returns the removed node.
    ///
    /// # Errors
    /// - [`BoundaryError::UnknownBoundary`] if the boundary is missing
    pub fn remove(&mut self, id: &BoundaryId) -> Result<BoundaryNode, BoundaryError> {
        self.cleanup(id)?;
        self.nodes
            .remove(id)
            .ok_or_else(|| BoundaryError::UnknownBoundary(id.clone()))
    }

    fn require(&self, id: &BoundaryId) -> Result<&BoundaryNode, BoundaryError> {
        self.nodes
            .get(id)
            .ok_or_else(|| BoundaryError::UnknownBoundary(id.clone()))
    }

    fn require_mut(&mut self, id: &BoundaryId) -> Result<&mut BoundaryNode, BoundaryError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| BoundaryError::UnknownBoundary(id.clone()))
    }
}

/// Apply one recovery strategy at a node. Absorption is the caller's call;
/// this performs the strategy's side effect only.
async fn apply_strategy(node: &BoundaryNode, strategy: &RecoveryStrategy, fault: &Fault) {
    match strategy {
        RecoveryStrategy::Retry {
            max_attempts,
            delay,
        } => {
            tracing::info!(
                boundary = %node.id,
                fault = fault.kind(),
                max_attempts,
                delay = ?delay,
                "retry strategy applied; the client performs the retries"
            );
        }
        RecoveryStrategy::Fail => {}
        RecoveryStrategy::Log(severity) => log_contained(*severity, &node.id, fault),
        RecoveryStrategy::Ignore => {
            tracing::debug!(boundary = %node.id, fault = fault.kind(), "fault ignored");
        }
        RecoveryStrategy::Custom { id, handler } => {
            tracing::debug!(boundary = %node.id, recovery = id.as_str(), "running custom recovery");
            handler(fault).await;
        }
    }
}

/// Log a contained fault at the severity the strategy names.
fn log_contained(severity: Severity, boundary: &BoundaryId, fault: &Fault) {
    match severity {
        Severity::Debug => {
            tracing::debug!(boundary = %boundary, severity = %severity, %fault, "fault contained");
        }
        Severity::Info => {
            tracing::info!(boundary = %boundary, severity = %severity, %fault, "fault contained");
        }
        Severity::Warning => {
            tracing::warn!(boundary = %boundary, severity = %severity, %fault, "fault contained");
        }
        Severity::Error | Severity::Critical => {
            tracing::error!(boundary = %boundary, severity = %severity, %fault, "fault contained");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bulkhead_policy::ContainmentCategory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Counting {
        hits: AtomicUsize,
    }

    impl Counting {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                hits: AtomicUsize::new(0),
            })
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FaultObserver for Counting {
        async fn observe(&self, _fault: &Fault) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct Tagged {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl FaultObserver for Tagged {
        async fn observe(&self, _fault: &Fault) {
            self.log.lock().unwrap().push(self.tag);
        }

        fn name(&self) -> &str {
            self.tag
        }
    }

    fn three_level() -> BoundaryTree {
        let mut tree = BoundaryTree::new();
        tree.insert(BoundarySpec::new("root", Severity::Critical))
            .unwrap();
        tree.insert(BoundarySpec::new("mid", Severity::Error).with_parent("root"))
            .unwrap();
        tree.insert(BoundarySpec::new("leaf", Severity::Warning).with_parent("mid"))
            .unwrap();
        tree
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut tree = BoundaryTree::new();
        tree.insert(BoundarySpec::new("root", Severity::Error))
            .unwrap();
        let result = tree.insert(BoundarySpec::new("root", Severity::Warning));
        assert!(matches!(result, Err(BoundaryError::DuplicateBoundary(_))));
    }

    #[test]
    fn insert_rejects_unknown_parent() {
        let mut tree = BoundaryTree::new();
        let result = tree.insert(BoundarySpec::new("orphan", Severity::Info).with_parent("ghost"));
        assert!(matches!(result, Err(BoundaryError::UnknownParent(_))));
        assert!(tree.is_empty());
    }

    #[test]
    fn insert_links_child_into_parent() {
        let tree = three_level();
        let root = tree.node(&BoundaryId::new("root")).unwrap();
        assert!(root.children().contains(&BoundaryId::new("mid")));
        let mid = tree.node(&BoundaryId::new("mid")).unwrap();
        assert_eq!(mid.parent(), Some(&BoundaryId::new("root")));
    }

    #[tokio::test]
    async fn network_fault_absorbs_at_first_boundary() {
        let tree = three_level();
        let outcome = tree
            .contain(&BoundaryId::new("leaf"), &Fault::Network("reset".into()))
            .await
            .unwrap();
        match outcome {
            Containment::Absorbed { by, strategy } => {
                assert_eq!(by, BoundaryId::new("leaf"));
                assert_eq!(
                    strategy,
                    RecoveryStrategy::retry(3, std::time::Duration::from_secs(2))
                );
            }
            Containment::Unabsorbed { .. } => panic!("network faults absorb in place"),
        }
    }

    #[tokio::test]
    async fn validation_fault_bubbles_to_root() {
        let tree = three_level();
        let outcome = tree
            .contain(&BoundaryId::new("leaf"), &Fault::Validation("bad input".into()))
            .await
            .unwrap();
        match outcome {
            Containment::Unabsorbed { root } => assert_eq!(root, BoundaryId::new("root")),
            Containment::Absorbed { .. } => panic!("validation faults bubble"),
        }
    }

    #[tokio::test]
    async fn observers_run_at_every_visited_level() {
        let mut tree = three_level();
        let at_root = Counting::new();
        let at_mid = Counting::new();
        let at_leaf = Counting::new();
        tree.add_handler(&BoundaryId::new("root"), at_root.clone())
            .unwrap();
        tree.add_handler(&BoundaryId::new("mid"), at_mid.clone())
            .unwrap();
        tree.add_handler(&BoundaryId::new("leaf"), at_leaf.clone())
            .unwrap();

        // Validation bubbles through all three levels.
        tree.contain(&BoundaryId::new("leaf"), &Fault::Validation("bad".into()))
            .await
            .unwrap();
        assert_eq!(at_leaf.hits(), 1);
        assert_eq!(at_mid.hits(), 1);
        assert_eq!(at_root.hits(), 1);

        // Network absorbs at the leaf; upper observers stay quiet.
        tree.contain(&BoundaryId::new("leaf"), &Fault::Network("reset".into()))
            .await
            .unwrap();
        assert_eq!(at_leaf.hits(), 2);
        assert_eq!(at_mid.hits(), 1);
        assert_eq!(at_root.hits(), 1);
    }

    #[tokio::test]
    async fn composition_handlers_run_before_primary() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut tree = BoundaryTree::new();
        tree.insert(
            BoundarySpec::new("zone", Severity::Warning)
                .with_handler(Arc::new(Tagged {
                    tag: "first",
                    log: Arc::clone(&log),
                }))
                .with_handler(Arc::new(Tagged {
                    tag: "second",
                    log: Arc::clone(&log),
                }))
                .with_primary(Arc::new(Tagged {
                    tag: "primary",
                    log: Arc::clone(&log),
                })),
        )
        .unwrap();

        tree.contain(&BoundaryId::new("zone"), &Fault::Network("reset".into()))
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "primary"]);
    }

    #[tokio::test]
    async fn strategy_override_redirects_containment() {
        let mut tree = BoundaryTree::new();
        tree.insert(BoundarySpec::new("root", Severity::Critical))
            .unwrap();
        tree.insert(
            BoundarySpec::new("tolerant", Severity::Info)
                .with_parent("root")
                .with_strategy(ContainmentCategory::Validation, RecoveryStrategy::Ignore),
        )
        .unwrap();

        // The override absorbs validation faults that would otherwise bubble.
        let outcome = tree
            .contain(&BoundaryId::new("tolerant"), &Fault::Validation("bad".into()))
            .await
            .unwrap();
        assert_eq!(outcome.absorbed_by(), Some(&BoundaryId::new("tolerant")));
    }

    #[tokio::test]
    async fn custom_recovery_runs_during_containment() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&runs);
        let mut tree = BoundaryTree::new();
        tree.insert(
            BoundarySpec::new("zone", Severity::Error).with_strategy(
                ContainmentCategory::Network,
                RecoveryStrategy::custom("reconnect", move |_| {
                    let counted = Arc::clone(&counted);
                    async move {
                        counted.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            ),
        )
        .unwrap();

        let outcome = tree
            .contain(&BoundaryId::new("zone"), &Fault::Network("reset".into()))
            .await
            .unwrap();
        assert!(outcome.is_absorbed());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let mut tree = three_level();
        let mid = BoundaryId::new("mid");

        tree.cleanup(&mid).unwrap();
        let node = tree.node(&mid).unwrap();
        assert_eq!(node.parent(), None);
        assert!(node.children().is_empty());
        assert_eq!(node.handler_count(), 0);

        // Second pass finds nothing to sever and succeeds.
        tree.cleanup(&mid).unwrap();
        let node = tree.node(&mid).unwrap();
        assert_eq!(node.parent(), None);
        assert!(node.children().is_empty());
    }

    #[tokio::test]
    async fn cleanup_detaches_children_from_the_chain() {
        let mut tree = three_level();
        tree.cleanup(&BoundaryId::new("mid")).unwrap();

        let root = tree.node(&BoundaryId::new("root")).unwrap();
        assert!(!root.children().contains(&BoundaryId::new("mid")));
        let leaf = tree.node(&BoundaryId::new("leaf")).unwrap();
        assert_eq!(leaf.parent(), None);

        // The detached leaf is now its own root: validation no longer bubbles.
        let outcome = tree
            .contain(&BoundaryId::new("leaf"), &Fault::Validation("bad".into()))
            .await
            .unwrap();
        match outcome {
            Containment::Unabsorbed { root } => assert_eq!(root, BoundaryId::new("leaf")),
            Containment::Absorbed { .. } => panic!("detached leaf cannot bubble"),
        }
    }

    #[test]
    fn cleanup_unknown_boundary_errors() {
        let mut tree = BoundaryTree::new();
        let result = tree.cleanup(&BoundaryId::new("ghost"));
        assert!(matches!(result, Err(BoundaryError::UnknownBoundary(_))));
    }

    #[tokio::test]
    async fn remove_drops_the_node() {
        let mut tree = three_level();
        let removed = tree.remove(&BoundaryId::new("leaf")).unwrap();
        assert_eq!(removed.id(), &BoundaryId::new("leaf"));
        assert!(!tree.contains(&BoundaryId::new("leaf")));

        let result = tree
            .contain(&BoundaryId::new("leaf"), &Fault::Network("reset".into()))
            .await;
        assert!(matches!(result, Err(BoundaryError::UnknownBoundary(_))));
    }

    #[test]
    fn attach_and_detach_sources() {
        let mut tree = three_level();
        let leaf = BoundaryId::new("leaf");

        tree.attach_source(&leaf, "client-1").unwrap();
        tree.attach_source(&leaf, "client-2").unwrap();
        assert!(tree.node(&leaf).unwrap().has_live_sources());
        assert_eq!(tree.node(&leaf).unwrap().attached_sources().len(), 2);

        tree.detach_source(&leaf, "client-1").unwrap();
        tree.detach_source(&leaf, "client-1").unwrap();
        assert_eq!(tree.node(&leaf).unwrap().attached_sources().len(), 1);
    }

    #[test]
    fn attach_moves_ownership_between_nodes() {
        let mut tree = three_level();
        let mid = BoundaryId::new("mid");
        let leaf = BoundaryId::new("leaf");

        tree.attach_source(&mid, "client-1").unwrap();
        tree.attach_source(&leaf, "client-1").unwrap();

        // The previous owner's claim is gone; only the last attachment holds.
        assert!(!tree.node(&mid).unwrap().has_live_sources());
        assert!(tree.node(&leaf).unwrap().attached_sources().contains("client-1"));

        // Re-attaching to the same node is a no-op.
        tree.attach_source(&leaf, "client-1").unwrap();
        assert_eq!(tree.node(&leaf).unwrap().attached_sources().len(), 1);
    }

    #[test]
    fn ids_iterate_in_order() {
        let tree = three_level();
        let ids: Vec<&str> = tree.ids().map(BoundaryId::as_str).collect();
        assert_eq!(ids, vec!["leaf", "mid", "root"]);
    }
}
