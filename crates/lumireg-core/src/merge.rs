//! Version-ordered merging of attribute documents.
//!
//! A slice's current value is the last-write-wins fold of every document
//! ever assigned to it, in ascending version order: a later document
//! overwrites only the top-level keys it specifies, never the whole prior
//! value. The fold is order-stable — replaying the same versions in the
//! same order always yields the same result.
//!
//! Reconstruction output must be dense (the range compactor walks it by
//! index), so [`densify`] fills every hole with the EMPTY sentinel.

use crate::document::Document;
use crate::model::SliceNumber;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

/// Status string carried by the sentinel component value.
pub const EMPTY_STATUS: &str = "EMPTY";

/// The sentinel value for a component with no recorded verdict.
#[must_use]
pub fn empty_component() -> Value {
    json!({"status": EMPTY_STATUS, "comment": "", "cause": ""})
}

/// Fold documents in the order given, last write wins per top-level key.
///
/// Callers supply ascending version order; this function is a plain
/// left-to-right fold and never reorders.
#[must_use]
pub fn merge_ordered<I>(documents: I) -> Document
where
    I: IntoIterator<Item = Document>,
{
    let mut merged = Document::new();
    for doc in documents {
        for (key, value) in doc.into_map() {
            merged.insert(key, value);
        }
    }
    merged
}

/// The set of top-level attribute keys appearing in any of the given
/// documents ("components present" across a dataset).
#[must_use]
pub fn components_present<'a, I>(documents: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut components = BTreeSet::new();
    for doc in documents {
        for (key, _) in doc {
            components.insert(key.clone());
        }
    }
    components
}

/// The subset of `observed` whose values differ from `current`.
///
/// Run updates store only what actually changed: keys equal in both
/// documents are dropped, keys new to `observed` or carrying a different
/// value are kept. Keys present only in `current` are untouched history and
/// never produce a change.
#[must_use]
pub fn changed_attributes(current: &Document, observed: &Document) -> Document {
    observed
        .iter()
        .filter(|&(key, value)| current.get(key) != Some(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Expand sparse per-slice merged values into a dense sequence covering
/// slice numbers `1..=max`, where `max` is the highest assigned slice.
///
/// Every emitted document carries every component present anywhere in the
/// input: a component a slice never recorded — and any slice with no
/// assignment at all — is filled with [`empty_component`].
///
/// An empty input yields an empty sequence.
#[must_use]
pub fn densify(merged: &BTreeMap<SliceNumber, Document>) -> Vec<Document> {
    let Some(max_slice) = merged.keys().next_back().copied() else {
        return Vec::new();
    };
    let components = components_present(merged.values());

    let mut dense = Vec::with_capacity(max_slice as usize);
    for slice in 1..=max_slice {
        let mut out = Document::new();
        let stored = merged.get(&slice);
        for component in &components {
            let value = stored
                .and_then(|doc| doc.get(component))
                .cloned()
                .unwrap_or_else(empty_component);
            out.insert(component.clone(), value);
        }
        dense.push(out);
    }
    dense
}
