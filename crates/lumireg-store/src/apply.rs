//! Transactional application of range changes.
//!
//! One range becomes exactly one Event + slice-event header + assignment
//! batch, written inside a single `BEGIN IMMEDIATE` transaction: the event
//! is never visible without its assignments. Every operation walks the
//! phase ladder below and ends in `Committed` or `RolledBack`; a
//! rolled-back operation's version stays consumed.
//!
//! ```text
//! Pending -> Validating -> DocumentInterned -> EventAppended
//!         -> AssignmentsWritten -> Committed
//! (any failure) -> RolledBack
//! ```

use crate::events::Provenance;
use crate::{assignments, dedup, events};
use anyhow::{Context, Result};
use lumireg_core::Error;
use lumireg_core::compact::Range;
use lumireg_core::model::{RunNumber, Source, Version};
use rusqlite::{Connection, TransactionBehavior};
use std::fmt;

/// Progress of one apply-change operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPhase {
    /// Nothing has happened yet.
    Pending,
    /// Checking the attribution precondition.
    Validating,
    /// The attribute document is interned.
    DocumentInterned,
    /// The event row is written.
    EventAppended,
    /// The assignment batch is written.
    AssignmentsWritten,
    /// Terminal: everything is visible.
    Committed,
    /// Terminal: nothing is visible, the version is skipped.
    RolledBack,
}

impl ApplyPhase {
    /// Snake-case phase name used in logs and error context.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::DocumentInterned => "document_interned",
            Self::EventAppended => "event_appended",
            Self::AssignmentsWritten => "assignments_written",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for ApplyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply one range to `(run, dataset, source)` as one atomic batch.
///
/// Allocates the version first (outside the transaction), then interns the
/// document, appends the event, and expands the assignments, all-or-nothing.
///
/// # Errors
///
/// [`Error::MissingActor`] before any side effect;
/// [`Error::TransactionConflict`] when a concurrent writer holds the store
/// (transient — retry from a fresh read); anything else with phase context.
pub fn apply_range(
    conn: &mut Connection,
    run: RunNumber,
    dataset: &str,
    source: Source,
    range: &Range,
    provenance: &Provenance,
) -> Result<Version> {
    provenance
        .validate()
        .with_context(|| phase_context(ApplyPhase::Validating, run, dataset, None))?;

    let version = events::allocate_version(conn)?;

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| classify_conflict(err, run, dataset, version))?;

    match write_batch(&tx, version, run, dataset, source, range, provenance) {
        Ok(()) => {
            tx.commit()
                .map_err(|err| classify_conflict(err, run, dataset, version))?;
            tracing::debug!(
                version,
                run,
                dataset,
                %source,
                start = range.start,
                end = range.end,
                phase = %ApplyPhase::Committed,
                "applied range"
            );
            Ok(version)
        }
        Err(err) => {
            // Dropping the transaction rolls everything back; the version
            // allocated above stays consumed.
            drop(tx);
            tracing::warn!(
                version,
                run,
                dataset,
                %source,
                error = %err,
                phase = %ApplyPhase::RolledBack,
                "range apply rolled back"
            );
            Err(err)
        }
    }
}

/// Apply a sequence of ranges, each as its own atomic batch, returning the
/// version each range committed under.
///
/// # Errors
///
/// Stops at the first failing range; earlier ranges stay committed.
pub fn apply_ranges(
    conn: &mut Connection,
    run: RunNumber,
    dataset: &str,
    source: Source,
    ranges: &[Range],
    provenance: &Provenance,
) -> Result<Vec<Version>> {
    let mut versions = Vec::with_capacity(ranges.len());
    for range in ranges {
        versions.push(apply_range(conn, run, dataset, source, range, provenance)?);
    }
    Ok(versions)
}

/// Run `op`, retrying up to `attempts` extra times when it fails with a
/// transient [`Error::TransactionConflict`]. Each retry starts from a fresh
/// read because `op` is re-entered from the top.
///
/// # Errors
///
/// The final failure once retries are exhausted, or immediately for
/// non-transient failures.
pub fn with_conflict_retry<T>(attempts: u32, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut remaining = attempts;
    loop {
        match op() {
            Err(err)
                if remaining > 0
                    && err
                        .downcast_ref::<Error>()
                        .is_some_and(Error::is_transient) =>
            {
                remaining -= 1;
                tracing::warn!(remaining, error = %err, "transient conflict, retrying from a fresh read");
            }
            other => return other,
        }
    }
}

fn write_batch(
    conn: &Connection,
    version: Version,
    run: RunNumber,
    dataset: &str,
    source: Source,
    range: &Range,
    provenance: &Provenance,
) -> Result<()> {
    let document_id = dedup::intern(conn, &range.values).with_context(|| {
        phase_context(ApplyPhase::DocumentInterned, run, dataset, Some(version))
    })?;
    events::append(conn, version, provenance)
        .with_context(|| phase_context(ApplyPhase::EventAppended, run, dataset, Some(version)))?;
    assignments::assign_range(
        conn,
        version,
        run,
        dataset,
        source,
        document_id,
        range.start,
        range.end,
    )
    .with_context(|| phase_context(ApplyPhase::AssignmentsWritten, run, dataset, Some(version)))?;
    Ok(())
}

fn phase_context(
    phase: ApplyPhase,
    run: RunNumber,
    dataset: &str,
    version: Option<Version>,
) -> String {
    match version {
        Some(version) => {
            format!("apply change to run {run} dataset '{dataset}' (version {version}, phase {phase})")
        }
        None => format!("apply change to run {run} dataset '{dataset}' (phase {phase})"),
    }
}

pub(crate) fn classify_conflict(
    err: rusqlite::Error,
    run: RunNumber,
    dataset: &str,
    version: Version,
) -> anyhow::Error {
    match err.sqlite_error_code() {
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked) => {
            Error::TransactionConflict {
                run,
                dataset: dataset.to_string(),
                version,
            }
            .into()
        }
        _ => anyhow::Error::from(err)
            .context(format!("transaction on run {run} dataset '{dataset}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_ledger_in_memory;
    use lumireg_core::Document;
    use serde_json::json;

    fn range(value: serde_json::Value, start: u32, end: u32) -> Range {
        Range {
            start,
            end,
            values: Document::from_value(value).expect("object value"),
        }
    }

    #[test]
    fn missing_actor_fails_before_any_side_effect() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        let err = apply_range(
            &mut conn,
            355_001,
            "online",
            Source::Reviewer,
            &range(json!({"dt": {"status": "GOOD"}}), 1, 3),
            &Provenance::new("", ""),
        )
        .expect_err("must fail");
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::MissingActor));

        // No version consumed, nothing written.
        let counter: i64 = conn
            .query_row("SELECT value FROM version_counter WHERE id = 1", [], |r| {
                r.get(0)
            })
            .expect("counter");
        assert_eq!(counter, 0);
        let docs: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))
            .expect("count");
        assert_eq!(docs, 0);
    }

    #[test]
    fn committed_batch_is_fully_visible() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        let version = apply_range(
            &mut conn,
            355_001,
            "online",
            Source::Feed,
            &range(json!({"beams_stable": true}), 1, 10),
            &Provenance::new("dqm-bot", "initial fill"),
        )
        .expect("apply");

        let assignment_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM slice_assignments WHERE version = ?1",
                [version],
                |r| r.get(0),
            )
            .expect("count");
        assert_eq!(assignment_count, 10);

        let actor: String = conn
            .query_row(
                "SELECT actor FROM events WHERE version = ?1",
                [version],
                |r| r.get(0),
            )
            .expect("actor");
        assert_eq!(actor, "dqm-bot");
    }

    #[test]
    fn failed_batch_skips_its_version() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        // An inverted range fails inside the transaction, after version
        // allocation.
        let err = apply_range(
            &mut conn,
            355_001,
            "online",
            Source::Feed,
            &range(json!({"beams_stable": true}), 5, 4),
            &Provenance::new("dqm-bot", ""),
        )
        .expect_err("must fail");
        assert!(err.to_string().contains("assignments_written"), "{err:#}");

        let events_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))
            .expect("count");
        assert_eq!(events_count, 0, "rollback must undo the event");

        let next = apply_range(
            &mut conn,
            355_001,
            "online",
            Source::Feed,
            &range(json!({"beams_stable": true}), 1, 1),
            &Provenance::new("dqm-bot", ""),
        )
        .expect("apply");
        assert_eq!(next, 2, "version 1 stays consumed by the rolled-back try");
    }

    #[test]
    fn apply_ranges_assigns_increasing_versions() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        let versions = apply_ranges(
            &mut conn,
            355_001,
            "online",
            Source::Reviewer,
            &[
                range(json!({"dt": {"status": "GOOD"}}), 1, 3),
                range(json!({"dt": {"status": "BAD"}}), 4, 6),
            ],
            &Provenance::new("shifter@example.org", "split verdict"),
        )
        .expect("apply");
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn retry_gives_up_after_attempts() {
        let mut calls = 0;
        let result: Result<()> = with_conflict_retry(2, || {
            calls += 1;
            Err(Error::TransactionConflict {
                run: 1,
                dataset: "online".into(),
                version: 1,
            }
            .into())
        });
        assert!(result.is_err());
        assert_eq!(calls, 3, "one try plus two retries");
    }

    #[test]
    fn retry_does_not_touch_fatal_errors() {
        let mut calls = 0;
        let result: Result<()> = with_conflict_retry(5, || {
            calls += 1;
            Err(Error::MissingActor.into())
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn identical_documents_across_batches_intern_once() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        for _ in 0..2 {
            apply_range(
                &mut conn,
                355_001,
                "online",
                Source::Feed,
                &range(json!({"beams_stable": true}), 1, 2),
                &Provenance::new("dqm-bot", ""),
            )
            .expect("apply");
        }

        let docs: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))
            .expect("count");
        assert_eq!(docs, 1, "both events must reference one stored document");
    }
}
