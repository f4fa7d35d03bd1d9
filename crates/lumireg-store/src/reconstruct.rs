//! Dataset reconstruction: event log → dense per-slice values.
//!
//! Joins the event log, the assignment index, and the dedup store, merges
//! each slice's documents in ascending version order (last write wins per
//! key), and fills gaps with the EMPTY sentinel so the output is dense —
//! one entry per slice number from 1 to the maximum assigned slice.

use crate::assignments;
use anyhow::Result;
use lumireg_core::compact::{Range, compact};
use lumireg_core::merge::{densify, merge_ordered};
use lumireg_core::model::{RunNumber, SliceNumber, Source};
use lumireg_core::{Document, Whitelist};
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Reconstruct the latest merged value of every slice of
/// `(run, dataset, source)`.
///
/// The result is dense and 1-indexed by position: entry `i` is slice
/// `i + 1`. A dataset with no assignments reconstructs to an empty
/// sequence. Reconstruction is a pure read — running it twice without
/// intervening writes yields identical sequences.
///
/// # Errors
///
/// Returns an error on query failure or corrupt stored documents.
pub fn reconstruct(
    conn: &Connection,
    run: RunNumber,
    dataset: &str,
    source: Source,
) -> Result<Vec<Document>> {
    let rows = assignments::assignments_for(conn, run, dataset, source)?;

    // Rows arrive ordered by (slice, version); group preserves that order,
    // so each slice's fold sees ascending versions.
    let mut grouped: BTreeMap<SliceNumber, Vec<Document>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.slice_number).or_default().push(row.document);
    }

    let merged: BTreeMap<SliceNumber, Document> = grouped
        .into_iter()
        .map(|(slice, docs)| (slice, merge_ordered(docs)))
        .collect();

    Ok(densify(&merged))
}

/// The compact range view of a reconstruction.
///
/// # Errors
///
/// Same as [`reconstruct`].
pub fn ranges(
    conn: &Connection,
    run: RunNumber,
    dataset: &str,
    source: Source,
    whitelist: &Whitelist,
) -> Result<Vec<Range>> {
    let slices = reconstruct(conn, run, dataset, source)?;
    Ok(compact(&slices, whitelist))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_ledger_in_memory;
    use crate::dedup;
    use crate::events::{Provenance, allocate_version, append};
    use lumireg_core::merge::empty_component;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        Document::from_value(value).expect("object value")
    }

    fn write_batch(
        conn: &Connection,
        run: RunNumber,
        value: serde_json::Value,
        start: SliceNumber,
        end: SliceNumber,
    ) {
        let version = allocate_version(conn).expect("allocate");
        append(conn, version, &Provenance::new("tester", "")).expect("append");
        let document_id = dedup::intern(conn, &doc(value)).expect("intern");
        assignments::assign_range(
            conn,
            version,
            run,
            "online",
            Source::Reviewer,
            document_id,
            start,
            end,
        )
        .expect("assign");
    }

    #[test]
    fn empty_dataset_reconstructs_to_nothing() {
        let conn = open_ledger_in_memory().expect("open ledger");
        let slices = reconstruct(&conn, 355_001, "online", Source::Reviewer).expect("reconstruct");
        assert!(slices.is_empty());
    }

    #[test]
    fn gaps_reconstruct_to_empty_sentinel() {
        // One event at slices 10-20; slices 1-9 must come back as
        // fully-EMPTY records and the sequence ends at 20.
        let conn = open_ledger_in_memory().expect("open ledger");
        write_batch(
            &conn,
            355_001,
            json!({"dt": {"status": "GOOD", "comment": "", "cause": ""}}),
            10,
            20,
        );

        let slices = reconstruct(&conn, 355_001, "online", Source::Reviewer).expect("reconstruct");
        assert_eq!(slices.len(), 20);
        for slice in &slices[..9] {
            assert_eq!(slice.get("dt"), Some(&empty_component()));
        }
        for slice in &slices[9..] {
            assert_eq!(
                slice.get("dt"),
                Some(&json!({"status": "GOOD", "comment": "", "cause": ""}))
            );
        }
    }

    #[test]
    fn later_version_overwrites_only_its_keys() {
        let conn = open_ledger_in_memory().expect("open ledger");
        write_batch(
            &conn,
            355_001,
            json!({
                "dt": {"status": "GOOD", "comment": "", "cause": ""},
                "csc": {"status": "GOOD", "comment": "", "cause": ""}
            }),
            1,
            4,
        );
        write_batch(
            &conn,
            355_001,
            json!({"dt": {"status": "BAD", "comment": "trip", "cause": "hv"}}),
            2,
            3,
        );

        let slices = reconstruct(&conn, 355_001, "online", Source::Reviewer).expect("reconstruct");
        assert_eq!(slices.len(), 4);
        // overwritten slices take v2's dt but keep v1's csc
        assert_eq!(
            slices[1].get("dt"),
            Some(&json!({"status": "BAD", "comment": "trip", "cause": "hv"}))
        );
        assert_eq!(
            slices[1].get("csc"),
            Some(&json!({"status": "GOOD", "comment": "", "cause": ""}))
        );
        // untouched slices keep v1 entirely
        assert_eq!(
            slices[0].get("dt"),
            Some(&json!({"status": "GOOD", "comment": "", "cause": ""}))
        );
    }

    #[test]
    fn reconstruction_is_idempotent() {
        let conn = open_ledger_in_memory().expect("open ledger");
        write_batch(&conn, 355_001, json!({"dt": {"status": "GOOD"}}), 1, 5);
        write_batch(&conn, 355_001, json!({"dt": {"status": "BAD"}}), 3, 3);

        let first = reconstruct(&conn, 355_001, "online", Source::Reviewer).expect("reconstruct");
        let second = reconstruct(&conn, 355_001, "online", Source::Reviewer).expect("reconstruct");
        assert_eq!(first, second);
    }

    #[test]
    fn ranges_compact_the_reconstruction() {
        let conn = open_ledger_in_memory().expect("open ledger");
        write_batch(
            &conn,
            355_001,
            json!({"dt": {"status": "GOOD", "comment": "", "cause": ""}}),
            1,
            5,
        );
        write_batch(
            &conn,
            355_001,
            json!({"dt": {"status": "BAD", "comment": "", "cause": ""}}),
            3,
            5,
        );

        let ranges =
            ranges(&conn, 355_001, "online", Source::Reviewer, &Whitelist::All).expect("ranges");
        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].start, ranges[0].end), (1, 2));
        assert_eq!((ranges[1].start, ranges[1].end), (3, 5));
    }
}
