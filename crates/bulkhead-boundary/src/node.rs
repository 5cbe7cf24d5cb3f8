//! Boundary identity, node state, and construction specs.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use bulkhead_policy::{ContainmentCategory, RecoveryStrategy, Severity};

use crate::handler::{FallbackAction, FaultObserver};

/// Unique identifier of a boundary within a process.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryId(String);

impl BoundaryId {
    /// Wrap a caller-chosen id string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The underlying id string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoundaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoundaryId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BoundaryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Construction-time description of a boundary.
///
/// A spec is the only way links enter the tree: the parent is fixed here and
/// never changed afterwards, which is what keeps the tree acyclic.
#[derive(Clone)]
pub struct BoundarySpec {
    pub(crate) id: BoundaryId,
    pub(crate) severity: Severity,
    pub(crate) scope: Option<String>,
    pub(crate) parent: Option<BoundaryId>,
    pub(crate) fallback: FallbackAction,
    pub(crate) primary: Option<Arc<dyn FaultObserver>>,
    pub(crate) handlers: Vec<Arc<dyn FaultObserver>>,
    pub(crate) overrides: HashMap<ContainmentCategory, RecoveryStrategy>,
}

impl BoundarySpec {
    /// Describe a root boundary with the given id and severity.
    #[must_use]
    pub fn new(id: impl Into<BoundaryId>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            severity,
            scope: None,
            parent: None,
            fallback: FallbackAction::noop(),
            primary: None,
            handlers: Vec::new(),
            overrides: HashMap::new(),
        }
    }

    /// Attach under an existing parent boundary.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<BoundaryId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Override the registry scope (defaults to the boundary id).
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the fallback command run when this boundary halts.
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackAction) -> Self {
        self.fallback = fallback;
        self
    }

    /// Attach the primary handler.
    #[must_use]
    pub fn with_primary(mut self, primary: Arc<dyn FaultObserver>) -> Self {
        self.primary = Some(primary);
        self
    }

    /// Append a composition handler to the ordered chain.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn FaultObserver>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Override the recovery strategy applied for one containment category.
    ///
    /// Categories without an override keep their default strategy.
    #[must_use]
    pub fn with_strategy(
        mut self,
        category: ContainmentCategory,
        strategy: RecoveryStrategy,
    ) -> Self {
        self.overrides.insert(category, strategy);
        self
    }

    /// The spec's boundary id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &BoundaryId {
        &self.id
    }
}

impl fmt::Debug for BoundarySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundarySpec")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("scope", &self.scope)
            .field("parent", &self.parent)
            .field("fallback", &self.fallback)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

/// One containment zone in the boundary tree.
///
/// Links are id references into the arena, never pointers. The parent link
/// is a back-reference only; ownership of a node rests with the arena.
pub struct BoundaryNode {
    pub(crate) id: BoundaryId,
    pub(crate) severity: Severity,
    pub(crate) scope: String,
    pub(crate) fallback: FallbackAction,
    pub(crate) parent: Option<BoundaryId>,
    pub(crate) children: BTreeSet<BoundaryId>,
    pub(crate) attached_sources: BTreeSet<String>,
    pub(crate) handlers: Vec<Arc<dyn FaultObserver>>,
    pub(crate) primary: Option<Arc<dyn FaultObserver>>,
    pub(crate) overrides: HashMap<ContainmentCategory, RecoveryStrategy>,
}

impl BoundaryNode {
    pub(crate) fn from_spec(spec: BoundarySpec) -> Self {
        let scope = spec
            .scope
            .unwrap_or_else(|| spec.id.as_str().to_string());
        Self {
            id: spec.id,
            severity: spec.severity,
            scope,
            fallback: spec.fallback,
            parent: spec.parent,
            children: BTreeSet::new(),
            attached_sources: BTreeSet::new(),
            handlers: spec.handlers,
            primary: spec.primary,
            overrides: spec.overrides,
        }
    }

    /// The boundary's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &BoundaryId {
        &self.id
    }

    /// The boundary's severity.
    #[inline]
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// The registry scope this boundary serves.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The fallback command run when this boundary halts.
    #[inline]
    #[must_use]
    pub fn fallback(&self) -> &FallbackAction {
        &self.fallback
    }

    /// Parent boundary, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&BoundaryId> {
        self.parent.as_ref()
    }

    /// Child boundary ids.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &BTreeSet<BoundaryId> {
        &self.children
    }

    /// Source ids currently attached to this boundary.
    #[inline]
    #[must_use]
    pub fn attached_sources(&self) -> &BTreeSet<String> {
        &self.attached_sources
    }

    /// Number of composition handlers in the chain.
    #[inline]
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Whether a primary handler is attached.
    #[inline]
    #[must_use]
    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Whether at least one source is attached.
    #[inline]
    #[must_use]
    pub fn has_live_sources(&self) -> bool {
        !self.attached_sources.is_empty()
    }

    /// Recovery strategy applied for a containment category at this node.
    ///
    /// An override configured on the spec wins; otherwise the category's
    /// default strategy applies.
    #[must_use]
    pub fn strategy_for(&self, category: ContainmentCategory) -> RecoveryStrategy {
        self.overrides
            .get(&category)
            .cloned()
            .unwrap_or_else(|| category.default_strategy())
    }
}

impl fmt::Debug for BoundaryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryNode")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("scope", &self.scope)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("attached_sources", &self.attached_sources)
            .field("handlers", &self.handlers.len())
            .field("primary", &self.primary.is_some())
            .field("overrides", &self.overrides.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_id_display_and_order() {
        let a = BoundaryId::new("alpha");
        let b = BoundaryId::new("beta");
        assert_eq!(a.to_string(), "alpha");
        assert!(a < b);
    }

    #[test]
    fn boundary_id_serde_is_transparent() {
        let id = BoundaryId::new("checkout");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"checkout\"");
        let back: BoundaryId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn scope_defaults_to_the_id() {
        let node = BoundaryNode::from_spec(BoundarySpec::new("payments", Severity::Error));
        assert_eq!(node.scope(), "payments");

        let node = BoundaryNode::from_spec(
            BoundarySpec::new("payments", Severity::Error).with_scope("payments-scope"),
        );
        assert_eq!(node.scope(), "payments-scope");
    }

    #[test]
    fn spec_builder_sets_links_and_chain() {
        let spec = BoundarySpec::new("child", Severity::Warning)
            .with_parent("root")
            .with_fallback(FallbackAction::noop());
        assert_eq!(spec.id().as_str(), "child");

        let node = BoundaryNode::from_spec(spec);
        assert_eq!(node.parent(), Some(&BoundaryId::new("root")));
        assert_eq!(node.handler_count(), 0);
        assert!(!node.has_primary());
        assert!(!node.has_live_sources());
    }

    #[test]
    fn strategy_override_wins_over_default() {
        let node = BoundaryNode::from_spec(
            BoundarySpec::new("tolerant", Severity::Info)
                .with_strategy(ContainmentCategory::Validation, RecoveryStrategy::Ignore),
        );
        assert_eq!(
            node.strategy_for(ContainmentCategory::Validation),
            RecoveryStrategy::Ignore
        );
        // Categories without an override keep the table defaults.
        assert_eq!(
            node.strategy_for(ContainmentCategory::System),
            ContainmentCategory::System.default_strategy()
        );
    }
}
