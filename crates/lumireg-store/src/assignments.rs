//! The slice assignment index.
//!
//! A version that applies to slices `N..=M` is expanded into one assignment
//! row per slice number, written as one atomic batch inside the caller's
//! transaction — a failure partway through leaves no partial assignments
//! because the whole operation rolls back.

use crate::dedup::{self, DocumentId};
use anyhow::{Context, Result};
use lumireg_core::Document;
use lumireg_core::model::{RunNumber, SliceNumber, Source, Version};
use rusqlite::{Connection, params};

/// One `(slice, version, document)` row of the reconstruction join.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRow {
    /// 1-indexed slice number.
    pub slice_number: SliceNumber,
    /// Version of the event that assigned the document.
    pub version: Version,
    /// The assigned attribute document.
    pub document: Document,
}

/// Record the slice-event header binding `version` to its document, then
/// expand the inclusive range `[start, end]` into assignment rows.
///
/// Runs inside the caller's transaction.
///
/// # Errors
///
/// Returns an error if `start > end` or any insert fails.
pub fn assign_range(
    conn: &Connection,
    version: Version,
    run: RunNumber,
    dataset: &str,
    source: Source,
    document_id: DocumentId,
    start: SliceNumber,
    end: SliceNumber,
) -> Result<()> {
    anyhow::ensure!(
        start >= 1 && start <= end,
        "invalid slice range {start}..={end} for version {version}"
    );

    conn.execute(
        "INSERT INTO slice_events (version, run_number, dataset, source, document_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![version, run, dataset, source.as_str(), document_id],
    )
    .with_context(|| format!("insert slice event version {version}"))?;

    let mut stmt = conn
        .prepare_cached("INSERT INTO slice_assignments (version, slice_number) VALUES (?1, ?2)")
        .context("prepare assignment insert")?;
    for slice in start..=end {
        stmt.execute(params![version, slice])
            .with_context(|| format!("assign version {version} to slice {slice}"))?;
    }

    tracing::debug!(version, run, dataset, %source, start, end, "assigned slice range");
    Ok(())
}

/// All assignments affecting `(run, dataset, source)` joined to their
/// documents, ordered by slice number then version — exactly the order the
/// reconstructor's merge requires.
///
/// # Errors
///
/// Returns an error on query failure or an unparsable stored document.
pub fn assignments_for(
    conn: &Connection,
    run: RunNumber,
    dataset: &str,
    source: Source,
) -> Result<Vec<AssignmentRow>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT sa.slice_number, se.version, d.body
             FROM slice_events se
             JOIN slice_assignments sa ON sa.version = se.version
             JOIN documents d ON d.id = se.document_id
             WHERE se.run_number = ?1 AND se.dataset = ?2 AND se.source = ?3
             ORDER BY sa.slice_number, se.version",
        )
        .context("prepare assignments query")?;

    let rows = stmt
        .query_map(params![run, dataset, source.as_str()], |row| {
            Ok((
                row.get::<_, SliceNumber>(0)?,
                row.get::<_, Version>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .context("query assignments")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read assignment rows")?;

    rows.into_iter()
        .map(|(slice_number, version, body)| {
            let document = serde_json::from_str(&body)
                .with_context(|| format!("parse document of version {version}"))?;
            Ok(AssignmentRow {
                slice_number,
                version,
                document,
            })
        })
        .collect()
}
