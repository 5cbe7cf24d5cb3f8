//! Violation history with a trailing-window frequency view.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bulkhead_boundary::BoundaryId;
use bulkhead_policy::{Fault, Severity};

/// One recorded violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Boundary the fault was decided at.
    pub boundary: BoundaryId,
    /// The routed fault.
    pub fault: Fault,
    /// Severity of the boundary when the violation was recorded.
    pub severity: Severity,
    /// Recording time.
    pub at: DateTime<Utc>,
}

/// Bounded per-boundary violation history.
///
/// Reads never mutate state, so frequency checks are repeatable. Appends
/// prune the oldest entries once a boundary exceeds the retention cap, but
/// never entries still inside the live window; the frequency check cannot
/// be made to undercount by retention pressure.
#[derive(Debug)]
pub struct ViolationLedger {
    window: chrono::Duration,
    retention: usize,
    entries: HashMap<BoundaryId, VecDeque<Violation>>,
}

impl ViolationLedger {
    /// Empty ledger with the given trailing window and retention cap.
    #[must_use]
    pub fn new(window: Duration, retention: usize) -> Self {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        Self {
            window,
            retention,
            entries: HashMap::new(),
        }
    }

    /// Append one violation, pruning stale entries beyond the cap.
    pub fn append(&mut self, violation: Violation) {
        let cutoff = self.cutoff(violation.at);
        let entries = self.entries.entry(violation.boundary.clone()).or_default();
        entries.push_back(violation);
        while entries.len() > self.retention {
            match entries.front() {
                Some(oldest) if oldest.at <= cutoff => {
                    entries.pop_front();
                }
                _ => break,
            }
        }
    }

    /// Violations recorded for `boundary` strictly inside the trailing
    /// window ending at `now`.
    #[must_use]
    pub fn recent_count(&self, boundary: &BoundaryId, now: DateTime<Utc>) -> usize {
        let cutoff = self.cutoff(now);
        self.entries
            .get(boundary)
            .map_or(0, |list| list.iter().filter(|v| v.at > cutoff).count())
    }

    /// Retained history for `boundary`, oldest first.
    #[must_use]
    pub fn history(&self, boundary: &BoundaryId) -> Vec<Violation> {
        self.entries
            .get(boundary)
            .map_or_else(Vec::new, |list| list.iter().cloned().collect())
    }

    /// Retained entries across all boundaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(VecDeque::len).sum()
    }

    /// Whether nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(VecDeque::is_empty)
    }

    /// Start of the trailing window ending at `now`. Saturates instead of
    /// overflowing for absurdly large windows.
    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn violation(boundary: &str, at: DateTime<Utc>) -> Violation {
        Violation {
            boundary: BoundaryId::new(boundary),
            fault: Fault::Network("connection reset".into()),
            severity: Severity::Warning,
            at,
        }
    }

    fn ledger() -> ViolationLedger {
        ViolationLedger::new(Duration::from_secs(600), 256)
    }

    #[test]
    fn append_then_count_sees_the_new_entry() {
        let mut ledger = ledger();
        let now = Utc::now();
        for _ in 0..6 {
            ledger.append(violation("widget", now));
        }
        // The entry just appended participates in its own frequency check.
        assert_eq!(ledger.recent_count(&BoundaryId::new("widget"), now), 6);
    }

    #[test]
    fn entries_at_the_window_edge_are_excluded() {
        let mut ledger = ledger();
        let now = Utc::now();
        ledger.append(violation("widget", now - chrono::Duration::seconds(600)));
        ledger.append(violation("widget", now - chrono::Duration::seconds(599)));

        assert_eq!(ledger.recent_count(&BoundaryId::new("widget"), now), 1);
        // Both stay retained; the window filters reads, not storage.
        assert_eq!(ledger.history(&BoundaryId::new("widget")).len(), 2);
    }

    #[test]
    fn counts_are_per_boundary() {
        let mut ledger = ledger();
        let now = Utc::now();
        ledger.append(violation("widget", now));
        ledger.append(violation("widget", now));
        ledger.append(violation("session", now));

        assert_eq!(ledger.recent_count(&BoundaryId::new("widget"), now), 2);
        assert_eq!(ledger.recent_count(&BoundaryId::new("session"), now), 1);
        assert_eq!(ledger.recent_count(&BoundaryId::new("app"), now), 0);
    }

    #[test]
    fn reads_do_not_mutate() {
        let mut ledger = ledger();
        let now = Utc::now();
        ledger.append(violation("widget", now));

        let first = ledger.recent_count(&BoundaryId::new("widget"), now);
        let second = ledger.recent_count(&BoundaryId::new("widget"), now);
        assert_eq!(first, second);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn retention_spares_entries_inside_the_window() {
        let mut ledger = ViolationLedger::new(Duration::from_secs(600), 2);
        let now = Utc::now();
        ledger.append(violation("widget", now));
        ledger.append(violation("widget", now));
        ledger.append(violation("widget", now));
        // Over the cap, but everything is live; nothing may be dropped.
        assert_eq!(ledger.history(&BoundaryId::new("widget")).len(), 3);

        // Once the old entries age out of the window, the cap applies again.
        let later = now + chrono::Duration::seconds(1200);
        ledger.append(violation("widget", later));
        assert_eq!(ledger.history(&BoundaryId::new("widget")).len(), 2);
    }

    #[test]
    fn history_is_oldest_first() {
        let mut ledger = ledger();
        let now = Utc::now();
        ledger.append(violation("widget", now - chrono::Duration::seconds(30)));
        ledger.append(violation("widget", now));

        let history = ledger.history(&BoundaryId::new("widget"));
        assert_eq!(history.len(), 2);
        assert!(history[0].at < history[1].at);
    }

    proptest! {
        #[test]
        fn recent_count_matches_entries_inside_the_window(
            ages in proptest::collection::vec(0i64..=1200, 0..32),
        ) {
            let mut ledger = ledger();
            let now = Utc::now();
            for age in &ages {
                ledger.append(violation("widget", now - chrono::Duration::seconds(*age)));
            }

            let expected = ages.iter().filter(|age| **age < 600).count();
            prop_assert_eq!(ledger.recent_count(&BoundaryId::new("widget"), now), expected);
            // Counting is a pure read; the cap never touched live entries.
            prop_assert_eq!(ledger.len(), ages.len());
        }
    }
}
