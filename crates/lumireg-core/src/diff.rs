//! Differential range computation.
//!
//! Given the previously reconstructed slice sequence and a newly observed
//! one, compute the minimal set of new ranges that converges the stored
//! history to the observed state. Slices whose whitelisted values did not
//! change produce no ranges at all — unchanged history is preserved, not
//! rewritten.

use crate::compact::Range;
use crate::document::Document;
use crate::error::Error;
use crate::whitelist::Whitelist;

/// Compute the ranges that changed between `previous` and `observed`.
///
/// The sequences are dense, 1-indexed by position, and must be the same
/// length. A range opens at the first slice whose restricted values differ
/// from the stored ones, carries the observed value, and closes only when
/// the observed value stops matching the subsequent observed entries (or at
/// the end of input) — re-matching the previous sequence does not close it,
/// so one range covers a changed region even when single slices inside it
/// happen to agree with history.
///
/// # Errors
///
/// [`Error::LengthMismatch`] when the sequences differ in length; nothing
/// is computed and nothing must be written.
pub fn diff_ranges(
    previous: &[Document],
    observed: &[Document],
    whitelist: &Whitelist,
) -> Result<Vec<Range>, Error> {
    if previous.len() != observed.len() {
        return Err(Error::LengthMismatch {
            previous: previous.len(),
            observed: observed.len(),
        });
    }

    let mut ranges: Vec<Range> = Vec::new();
    let mut open = false;
    for (number, (prev, new)) in (1..).zip(previous.iter().zip(observed.iter())) {
        let new_values = whitelist.restrict(new);
        if open {
            if let Some(last) = ranges.last_mut() {
                if last.values == new_values {
                    last.end = number;
                    continue;
                }
            }
            open = false;
        }
        if !whitelist.eq_restricted(prev, new) {
            ranges.push(Range {
                start: number,
                end: number,
                values: new_values,
            });
            open = true;
        }
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        Document::from_value(value).expect("object value")
    }

    fn seq(values: &[serde_json::Value]) -> Vec<Document> {
        values.iter().cloned().map(doc).collect()
    }

    #[test]
    fn equal_sequences_produce_no_ranges() {
        let slices = seq(&[json!({"a": 1}), json!({"a": 2})]);
        let ranges = diff_ranges(&slices, &slices, &Whitelist::All).expect("equal lengths");
        assert!(ranges.is_empty());
    }

    #[test]
    fn length_mismatch_is_fatal() {
        let prev = seq(&[json!({"a": 1})]);
        let new = seq(&[json!({"a": 1}), json!({"a": 2})]);
        let err = diff_ranges(&prev, &new, &Whitelist::All).unwrap_err();
        assert_eq!(
            err,
            Error::LengthMismatch {
                previous: 1,
                observed: 2
            }
        );
    }

    #[test]
    fn single_changed_slice_is_one_range() {
        let prev = seq(&[json!({"a": 1}), json!({"a": 1}), json!({"a": 1})]);
        let new = seq(&[json!({"a": 1}), json!({"a": 2}), json!({"a": 1})]);
        let ranges = diff_ranges(&prev, &new, &Whitelist::All).expect("equal lengths");
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].start, ranges[0].end), (2, 2));
        assert_eq!(ranges[0].values, doc(json!({"a": 2})));
    }

    #[test]
    fn changed_region_spans_contiguous_slices() {
        let prev = seq(&vec![json!({"a": 1}); 5]);
        let new = seq(&[
            json!({"a": 1}),
            json!({"a": 2}),
            json!({"a": 2}),
            json!({"a": 3}),
            json!({"a": 1}),
        ]);
        let ranges = diff_ranges(&prev, &new, &Whitelist::All).expect("equal lengths");
        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].start, ranges[0].end), (2, 3));
        assert_eq!(ranges[0].values, doc(json!({"a": 2})));
        assert_eq!((ranges[1].start, ranges[1].end), (4, 4));
        assert_eq!(ranges[1].values, doc(json!({"a": 3})));
    }

    #[test]
    fn open_range_extends_over_slices_matching_history() {
        // After the mismatch at slice 1, slices 2-3 already carried the new
        // value; the open range still covers them because the observed value
        // keeps matching — re-matching history does not close it.
        let prev = seq(&[json!({"a": 1}), json!({"a": 2}), json!({"a": 2})]);
        let new = seq(&[json!({"a": 2}), json!({"a": 2}), json!({"a": 2})]);
        let ranges = diff_ranges(&prev, &new, &Whitelist::All).expect("equal lengths");
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].start, ranges[0].end), (1, 3));
    }

    #[test]
    fn range_closes_when_observed_value_changes() {
        let prev = seq(&[json!({"a": 1}), json!({"a": 2})]);
        let new = seq(&[json!({"a": 9}), json!({"a": 2})]);
        let ranges = diff_ranges(&prev, &new, &Whitelist::All).expect("equal lengths");
        // slice 2: observed value differs from the open range but matches
        // history, so the range closes and no new one opens
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].start, ranges[0].end), (1, 1));
    }

    #[test]
    fn change_ending_at_sequence_end_closes_at_len() {
        let prev = seq(&[json!({"a": 1}), json!({"a": 1}), json!({"a": 1})]);
        let new = seq(&[json!({"a": 1}), json!({"a": 2}), json!({"a": 2})]);
        let ranges = diff_ranges(&prev, &new, &Whitelist::All).expect("equal lengths");
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].start, ranges[0].end), (2, 3));
    }

    #[test]
    fn whitelist_masks_offlist_changes() {
        let wl = Whitelist::from_keys(["dt"]);
        let prev = seq(&[json!({"dt": {"status": "GOOD"}, "lumi": 1.0})]);
        let new = seq(&[json!({"dt": {"status": "GOOD"}, "lumi": 7.5})]);
        let ranges = diff_ranges(&prev, &new, &wl).expect("equal lengths");
        assert!(ranges.is_empty());
    }

    #[test]
    fn ranges_carry_restricted_values_only() {
        let wl = Whitelist::from_keys(["dt"]);
        let prev = seq(&[json!({"dt": {"status": "GOOD"}, "lumi": 1.0})]);
        let new = seq(&[json!({"dt": {"status": "BAD"}, "lumi": 1.0})]);
        let ranges = diff_ranges(&prev, &new, &wl).expect("equal lengths");
        assert_eq!(ranges.len(), 1);
        assert!(ranges[0].values.get("lumi").is_none());
        assert_eq!(ranges[0].values.get("dt"), Some(&json!({"status": "BAD"})));
    }

    #[test]
    fn empty_sequences_are_trivially_equal() {
        let ranges = diff_ranges(&[], &[], &Whitelist::All).expect("equal lengths");
        assert!(ranges.is_empty());
    }
}
