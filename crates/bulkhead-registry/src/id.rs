//! Identifier spaces connected by the registry maps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one failing client instance.
///
/// A source maps to at most one scope at a time; re-associating overwrites.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Wrap a caller-chosen source id.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh id for a client without a stable name.
    #[must_use]
    pub fn random() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// The underlying id string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a containment scope served by one boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    /// Wrap a caller-chosen scope id.
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

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ScopeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_source_ids_are_unique() {
        let a = SourceId::random();
        let b = SourceId::random();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_serialize_transparently() {
        let source = SourceId::new("client-7");
        let json = serde_json::to_string(&source).unwrap();
        assert_eq!(json, "\"client-7\"");

        let scope: ScopeId = serde_json::from_str("\"checkout\"").unwrap();
        assert_eq!(scope, ScopeId::new("checkout"));
    }

    #[test]
    fn display_shows_the_raw_id() {
        assert_eq!(SourceId::new("k1").to_string(), "k1");
        assert_eq!(ScopeId::new("scope-x").to_string(), "scope-x");
    }
}
