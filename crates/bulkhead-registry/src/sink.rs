//! Terminal destination for faults that cannot reach a boundary.
//!
//! A missing association is an operational condition, not a crash: the
//! propagation path records the fault here and returns normally. Sink
//! implementations must never panic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use bulkhead_policy::Fault;

use crate::id::{ScopeId, SourceId};

/// Why a fault could not be routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "scope", rename_all = "snake_case")]
pub enum UnroutedReason {
    /// No scope association exists for the source.
    UnknownSource,
    /// The source's scope has no registered boundary.
    UnknownScope(ScopeId),
    /// The registry worker has already stopped.
    RegistryStopped,
}

/// Record of one fault that went to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnhandledReport {
    /// The source that raised the fault.
    pub source: SourceId,
    /// The fault itself.
    pub fault: Fault,
    /// Why no route existed.
    pub reason: UnroutedReason,
    /// When the fault was sunk.
    pub at: DateTime<Utc>,
}

/// Terminal handler for unroutable faults.
#[async_trait]
pub trait UnhandledSink: Send + Sync {
    /// Record an unroutable fault. Must return normally; never panic.
    async fn record(&self, report: UnhandledReport);
}

/// Default sink: structured log line, counters, and a bounded ring of the
/// most recent reports for diagnostics.
pub struct TracingSink {
    per_source: DashMap<SourceId, u64>,
    recent: Mutex<VecDeque<UnhandledReport>>,
    capacity: usize,
    total: AtomicU64,
}

impl TracingSink {
    /// Default capacity of the recent-report ring.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Sink retaining up to `capacity` recent reports.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            per_source: DashMap::new(),
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            total: AtomicU64::new(0),
        }
    }

    /// Total reports recorded.
    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Reports recorded for one source.
    #[must_use]
    pub fn count_for(&self, source: &SourceId) -> u64 {
        self.per_source.get(source).map_or(0, |count| *count)
    }

    /// The most recent reports, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<UnhandledReport> {
        self.recent.lock().iter().cloned().collect()
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl UnhandledSink for TracingSink {
    async fn record(&self, report: UnhandledReport) {
        tracing::warn!(
            source = %report.source,
            fault = %report.fault,
            reason = ?report.reason,
            "unroutable fault sunk"
        );
        metrics::counter!("bulkhead_unrouted_faults_total").increment(1);

        *self.per_source.entry(report.source.clone()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::Relaxed);

        let mut recent = self.recent.lock();
        if recent.len() >= self.capacity {
            recent.pop_front();
        }
        recent.push_back(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(source: &str, message: &str) -> UnhandledReport {
        UnhandledReport {
            source: SourceId::new(source),
            fault: Fault::Unknown(message.into()),
            reason: UnroutedReason::UnknownSource,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn sink_counts_per_source_and_total() {
        let sink = TracingSink::default();
        sink.record(report("a", "one")).await;
        sink.record(report("a", "two")).await;
        sink.record(report("b", "three")).await;

        assert_eq!(sink.total(), 3);
        assert_eq!(sink.count_for(&SourceId::new("a")), 2);
        assert_eq!(sink.count_for(&SourceId::new("b")), 1);
        assert_eq!(sink.count_for(&SourceId::new("missing")), 0);
    }

    #[tokio::test]
    async fn ring_keeps_only_the_most_recent() {
        let sink = TracingSink::new(2);
        sink.record(report("a", "one")).await;
        sink.record(report("a", "two")).await;
        sink.record(report("a", "three")).await;

        let recent = sink.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].fault, Fault::Unknown("two".into()));
        assert_eq!(recent[1].fault, Fault::Unknown("three".into()));
        // The total keeps counting past the ring capacity.
        assert_eq!(sink.total(), 3);
    }

    #[test]
    fn reason_serializes_with_scope_payload() {
        let json = serde_json::to_string(&UnroutedReason::UnknownScope(ScopeId::new("s1"))).unwrap();
        assert_eq!(json, r#"{"reason":"unknown_scope","scope":"s1"}"#);
        let json = serde_json::to_string(&UnroutedReason::UnknownSource).unwrap();
        assert_eq!(json, r#"{"reason":"unknown_source"}"#);
    }
}
