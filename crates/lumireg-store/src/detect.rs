//! New-run and changed-run detection over a feed batch.
//!
//! The polling feed hands over a batch of observed runs; the ledger decides
//! which of them it has never seen (deduplicated within the batch — feeds
//! repeat themselves) and which stored runs drifted from their observed
//! feed attributes and need an update.

use crate::runs::RunRecord;
use lumireg_core::Document;
use lumireg_core::merge::changed_attributes;
use lumireg_core::model::RunNumber;
use std::collections::{HashMap, HashSet};

/// One run as observed by the feed.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObservedRun {
    /// Accelerator-assigned run number.
    pub run: RunNumber,
    /// The feed attributes as observed.
    pub feed_attributes: Document,
}

/// Observed runs not yet stored, batch-deduplicated, observation order kept.
#[must_use]
pub fn new_runs<'a>(observed: &'a [ObservedRun], stored: &[RunRecord]) -> Vec<&'a ObservedRun> {
    let known: HashSet<RunNumber> = stored.iter().map(|record| record.run).collect();

    let mut seen = HashSet::new();
    observed
        .iter()
        .filter(|candidate| !known.contains(&candidate.run) && seen.insert(candidate.run))
        .collect()
}

/// Stored runs whose observed feed attributes changed.
///
/// Returns the observed entries (they carry the new values); a run that is
/// observed but not stored is not an update candidate.
#[must_use]
pub fn runs_to_update<'a>(
    observed: &'a [ObservedRun],
    stored: &[RunRecord],
) -> Vec<&'a ObservedRun> {
    let by_number: HashMap<RunNumber, &RunRecord> =
        stored.iter().map(|record| (record.run, record)).collect();

    observed
        .iter()
        .filter(|candidate| {
            by_number.get(&candidate.run).is_some_and(|record| {
                !changed_attributes(&record.feed_attributes, &candidate.feed_attributes)
                    .is_empty()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        Document::from_value(value).expect("object value")
    }

    fn observed(run: RunNumber, energy: i64) -> ObservedRun {
        ObservedRun {
            run,
            feed_attributes: doc(json!({"energy": energy})),
        }
    }

    fn stored(run: RunNumber, energy: i64) -> RunRecord {
        RunRecord {
            run,
            feed_attributes: doc(json!({"energy": energy})),
            reviewer_attributes: Document::new(),
            deleted: false,
            version: 1,
        }
    }

    #[test]
    fn unknown_runs_are_new() {
        let batch = [observed(1, 10), observed(2, 10), observed(3, 10)];
        let existing = [stored(2, 10)];
        let fresh: Vec<RunNumber> = new_runs(&batch, &existing).iter().map(|o| o.run).collect();
        assert_eq!(fresh, vec![1, 3]);
    }

    #[test]
    fn duplicates_within_batch_count_once() {
        let batch = [observed(1, 10), observed(1, 11)];
        let fresh = new_runs(&batch, &[]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].feed_attributes.get("energy"), Some(&json!(10)));
    }

    #[test]
    fn changed_feed_attributes_trigger_update() {
        let batch = [observed(1, 10), observed(2, 99)];
        let existing = [stored(1, 10), stored(2, 10)];
        let updates: Vec<RunNumber> = runs_to_update(&batch, &existing)
            .iter()
            .map(|o| o.run)
            .collect();
        assert_eq!(updates, vec![2]);
    }

    #[test]
    fn unstored_runs_are_not_update_candidates() {
        let batch = [observed(7, 10)];
        assert!(runs_to_update(&batch, &[]).is_empty());
    }

    #[test]
    fn new_attribute_keys_count_as_change() {
        let batch = [ObservedRun {
            run: 1,
            feed_attributes: doc(json!({"energy": 10, "fill": 9200})),
        }];
        let existing = [stored(1, 10)];
        assert_eq!(runs_to_update(&batch, &existing).len(), 1);
    }
}
