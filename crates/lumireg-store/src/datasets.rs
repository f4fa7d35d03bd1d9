//! Dataset projection rows.
//!
//! A dataset row is derived state: its attributes are the merge of every
//! patch an operation applied, and its version always equals the highest
//! version of a contributing event. Operations that change a dataset's
//! lumisections bump the row (an empty patch) in the same transaction, so
//! downstream caches can detect staleness by version alone.

use anyhow::{Context, Result};
use lumireg_core::Document;
use lumireg_core::merge::merge_ordered;
use lumireg_core::model::{RunNumber, Version};
use rusqlite::{Connection, OptionalExtension, params};

/// One materialized dataset row.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DatasetRecord {
    /// The run the dataset belongs to.
    pub run: RunNumber,
    /// Dataset name (e.g. `online`).
    pub name: String,
    /// Merged dataset attributes.
    pub attributes: Document,
    /// Highest contributing event version.
    pub version: Version,
}

/// Merge `patch` into the dataset row and raise its version to `version`.
///
/// Creates the row if it does not exist. Runs inside the caller's
/// transaction. The stored version never decreases — replaying an old
/// version is a no-op on the version field.
///
/// # Errors
///
/// Returns an error if the read or the upsert fails.
pub fn upsert(
    conn: &Connection,
    run: RunNumber,
    name: &str,
    patch: &Document,
    version: Version,
) -> Result<DatasetRecord> {
    let existing = get(conn, run, name)?;
    let (attributes, version) = existing.map_or_else(
        || (patch.clone(), version),
        |record| {
            (
                merge_ordered([record.attributes, patch.clone()]),
                record.version.max(version),
            )
        },
    );

    conn.execute(
        "INSERT INTO datasets (run_number, name, attributes, version)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(run_number, name) DO UPDATE SET
             attributes = excluded.attributes,
             version = excluded.version",
        params![run, name, attributes.canonical_json(), version],
    )
    .with_context(|| format!("upsert dataset '{name}' of run {run}"))?;

    Ok(DatasetRecord {
        run,
        name: name.to_string(),
        attributes,
        version,
    })
}

/// Load one dataset row.
///
/// # Errors
///
/// Returns an error on query failure or a corrupt stored attribute document.
pub fn get(conn: &Connection, run: RunNumber, name: &str) -> Result<Option<DatasetRecord>> {
    let row = conn
        .query_row(
            "SELECT attributes, version FROM datasets WHERE run_number = ?1 AND name = ?2",
            params![run, name],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Version>(1)?)),
        )
        .optional()
        .with_context(|| format!("read dataset '{name}' of run {run}"))?;

    row.map(|(attributes, version)| {
        let attributes = serde_json::from_str(&attributes)
            .with_context(|| format!("parse attributes of dataset '{name}' run {run}"))?;
        Ok(DatasetRecord {
            run,
            name: name.to_string(),
            attributes,
            version,
        })
    })
    .transpose()
}

/// All dataset rows of a run, ordered by name.
///
/// # Errors
///
/// Returns an error on query failure or a corrupt stored attribute document.
pub fn for_run(conn: &Connection, run: RunNumber) -> Result<Vec<DatasetRecord>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT name, attributes, version FROM datasets
             WHERE run_number = ?1 ORDER BY name",
        )
        .context("prepare datasets query")?;
    let rows = stmt
        .query_map([run], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Version>(2)?,
            ))
        })
        .context("query datasets")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read dataset rows")?;

    rows.into_iter()
        .map(|(name, attributes, version)| {
            let attributes = serde_json::from_str(&attributes)
                .with_context(|| format!("parse attributes of dataset '{name}' run {run}"))?;
            Ok(DatasetRecord {
                run,
                name,
                attributes,
                version,
            })
        })
        .collect()
}
