/// Object ledger
///
/// Authoritative per-class record of what has been seen: description and
/// usage captured on first sighting, and a running count.

use crate::enrichment::Enrichment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One detected object class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub label: String,
    pub description: String,
    pub usage: String,
    pub count: u64,
}

/// Result of recording an accepted sighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SightingOutcome {
    pub is_new: bool,
    pub count: u64,
}

/// Point-in-time copy of the ledger for display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Records in first-seen order
    pub records: Vec<DetectedObject>,
    pub total: u64,
}

#[derive(Debug, Default)]
pub struct ObjectLedger {
    records: Vec<DetectedObject>,
    index: HashMap<String, usize>,
}

impl ObjectLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an accepted sighting of `label`.
    ///
    /// `lookup` runs only when the label is not yet in the ledger; its result
    /// is stored once and never overwritten.
    pub fn record_sighting<F>(&mut self, label: &str, lookup: F) -> SightingOutcome
    where
        F: FnOnce(&str) -> Enrichment,
    {
        if let Some(&idx) = self.index.get(label) {
            let record = &mut self.records[idx];
            record.count += 1;
            return SightingOutcome {
                is_new: false,
                count: record.count,
            };
        }

        let Enrichment { description, usage } = lookup(label);
        debug!("New ledger entry: {}", label);

        self.index.insert(label.to_string(), self.records.len());
        self.records.push(DetectedObject {
            label: label.to_string(),
            description,
            usage,
            count: 1,
        });

        SightingOutcome {
            is_new: true,
            count: 1,
        }
    }

    pub fn get(&self, label: &str) -> Option<&DetectedObject> {
        self.index.get(label).map(|&idx| &self.records[idx])
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.records.iter().map(|r| r.count).sum()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            records: self.records.clone(),
            total: self.total(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_first_sighting_is_new() {
        let mut ledger = ObjectLedger::new();

        let outcome = ledger.record_sighting("cup", |_| Enrichment::new("container", "drinking"));

        assert_eq!(outcome, SightingOutcome { is_new: true, count: 1 });
        let record = ledger.get("cup").unwrap();
        assert_eq!(record.description, "container");
        assert_eq!(record.usage, "drinking");
        assert_eq!(record.count, 1);
    }

    #[test]
    fn test_lookup_only_on_first_sighting() {
        let mut ledger = ObjectLedger::new();
        let calls = Cell::new(0);

        for expected in 1..=4 {
            let outcome = ledger.record_sighting("cup", |label| {
                calls.set(calls.get() + 1);
                Enrichment::new(format!("about {}", label), "x")
            });
            assert_eq!(outcome.count, expected);
            assert_eq!(outcome.is_new, expected == 1);
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(ledger.get("cup").unwrap().description, "about cup");
    }

    #[test]
    fn test_text_never_overwritten() {
        let mut ledger = ObjectLedger::new();
        ledger.record_sighting("cup", |_| Enrichment::new("first", "first"));
        ledger.record_sighting("cup", |_| Enrichment::new("second", "second"));

        assert_eq!(ledger.get("cup").unwrap().description, "first");
    }

    #[test]
    fn test_total_matches_counts() {
        let mut ledger = ObjectLedger::new();
        ledger.record_sighting("cup", |_| Enrichment::placeholder());
        ledger.record_sighting("bottle", |_| Enrichment::placeholder());
        assert_eq!(ledger.total(), 2);
        assert_eq!(ledger.len(), 2);

        ledger.record_sighting("cup", |_| Enrichment::placeholder());
        ledger.record_sighting("cup", |_| Enrichment::placeholder());

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.total, 4);
        assert_eq!(snapshot.total, snapshot.records.iter().map(|r| r.count).sum::<u64>());
    }

    #[test]
    fn test_snapshot_keeps_first_seen_order() {
        let mut ledger = ObjectLedger::new();
        for label in ["person", "cup", "bottle", "cup"] {
            ledger.record_sighting(label, |_| Enrichment::placeholder());
        }

        let labels: Vec<_> = ledger.snapshot().records.into_iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["person", "cup", "bottle"]);
    }

    #[test]
    fn test_clear_restarts_counts() {
        let mut ledger = ObjectLedger::new();
        ledger.record_sighting("cup", |_| Enrichment::new("old", "old"));
        ledger.record_sighting("cup", |_| Enrichment::new("old", "old"));

        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.total(), 0);

        let outcome = ledger.record_sighting("cup", |_| Enrichment::new("fresh", "fresh"));
        assert_eq!(outcome, SightingOutcome { is_new: true, count: 1 });
        assert_eq!(ledger.get("cup").unwrap().description, "fresh");
    }

    #[test]
    fn test_placeholder_entry() {
        let mut ledger = ObjectLedger::new();
        ledger.record_sighting("widget", |_| Enrichment::placeholder());

        let record = ledger.get("widget").unwrap();
        assert_eq!(record.description, "No description available");
        assert_eq!(record.usage, "No usage information available");
        assert_eq!(record.count, 1);
    }
}
