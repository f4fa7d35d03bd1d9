//! Run-level events, lifecycle, and the run projection.
//!
//! Run changes are events like everything else: each one stores the
//! changed-attribute documents (feed and reviewer, both interned) and the
//! projection row is recomputed from the full event history inside the same
//! transaction — merged attributes across all versions, last write wins per
//! key, projection version equal to the maximum contributing version. The
//! `runs` table is never written outside that recomputation.

use crate::apply::classify_conflict;
use crate::{dedup, events};
use crate::events::Provenance;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lumireg_core::Error;
use lumireg_core::merge::{changed_attributes, merge_ordered};
use lumireg_core::model::{RunNumber, Version};
use lumireg_core::Document;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Lifecycle states a run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Accepting edits.
    Open,
    /// Signed off by reviewers; edits refused.
    Signoff,
    /// Fully processed.
    Completed,
}

/// Error returned when parsing an unknown run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRunState {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown run state '{}': expected one of OPEN, SIGNOFF, COMPLETED",
            self.raw
        )
    }
}

impl std::error::Error for UnknownRunState {}

impl RunState {
    /// All lifecycle states.
    pub const ALL: [Self; 3] = [Self::Open, Self::Signoff, Self::Completed];

    /// Canonical uppercase form stored in reviewer attributes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Signoff => "SIGNOFF",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = UnknownRunState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "SIGNOFF" => Ok(Self::Signoff),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(UnknownRunState { raw: s.to_string() }),
        }
    }
}

/// One materialized run row.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RunRecord {
    /// Accelerator-assigned run number.
    pub run: RunNumber,
    /// Merged feed attributes across all versions.
    pub feed_attributes: Document,
    /// Merged reviewer attributes across all versions.
    pub reviewer_attributes: Document,
    /// Soft-delete flag from the latest event.
    pub deleted: bool,
    /// Maximum contributing event version.
    pub version: Version,
}

impl RunRecord {
    /// The lifecycle state carried in the reviewer attributes, if any.
    #[must_use]
    pub fn state(&self) -> Option<RunState> {
        self.reviewer_attributes
            .get("state")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// `true` when the run is flagged significant.
    #[must_use]
    pub fn is_significant(&self) -> bool {
        self.reviewer_attributes
            .get("significant")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// One run event joined with its authorship.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RunEventRecord {
    /// Event version.
    pub version: Version,
    /// Who made the change.
    pub actor: String,
    /// Why.
    pub comment: String,
    /// When.
    pub created_at: DateTime<Utc>,
    /// Feed attributes changed by this event.
    pub feed_changes: Document,
    /// Reviewer attributes changed by this event.
    pub reviewer_changes: Document,
    /// Soft-delete flag carried by this event.
    pub deleted: bool,
}

/// Create a new run from its first observed attribute sets.
///
/// The reviewer attributes default to lifecycle state `OPEN` when the
/// caller does not supply one.
///
/// # Errors
///
/// [`Error::RunExists`] when the run projection already has the row;
/// [`Error::MissingActor`]; storage failures with context.
pub fn create(
    conn: &mut Connection,
    run: RunNumber,
    feed: &Document,
    reviewer: &Document,
    provenance: &Provenance,
) -> Result<RunRecord> {
    if get(conn, run)?.is_some() {
        return Err(Error::RunExists { run }.into());
    }

    let mut reviewer = reviewer.clone();
    if reviewer.get("state").is_none() {
        reviewer.insert("state", Value::String(RunState::Open.as_str().to_string()));
    }

    record_change(conn, run, feed, &reviewer, false, provenance)
}

/// Apply a reviewer edit: store only the attributes that actually changed.
///
/// Follows the edit rule: when no reviewer attribute changed, nothing is
/// written — feed-only drift is left to [`refresh_from_feed`]. Returns the
/// refreshed projection row, or `None` when no event was written.
///
/// # Errors
///
/// [`Error::RunNotFound`]; [`Error::RunNotOpen`] unless the run is `OPEN`;
/// [`Error::MissingActor`]; storage failures with context.
pub fn edit(
    conn: &mut Connection,
    run: RunNumber,
    observed_feed: &Document,
    observed_reviewer: &Document,
    provenance: &Provenance,
) -> Result<Option<RunRecord>> {
    let current = require_open(conn, run)?;

    let feed_changes = changed_attributes(&current.feed_attributes, observed_feed);
    let reviewer_changes = changed_attributes(&current.reviewer_attributes, observed_reviewer);
    if reviewer_changes.is_empty() {
        tracing::debug!(run, "edit changed no reviewer attributes, nothing to store");
        return Ok(None);
    }

    record_change(conn, run, &feed_changes, &reviewer_changes, false, provenance).map(Some)
}

/// Converge the stored feed attributes to a newly observed set.
///
/// Stores only the changed keys; an unchanged observation writes nothing.
///
/// # Errors
///
/// [`Error::RunNotFound`]; [`Error::RunNotOpen`] unless the run is `OPEN`;
/// [`Error::MissingActor`]; storage failures with context.
pub fn refresh_from_feed(
    conn: &mut Connection,
    run: RunNumber,
    observed_feed: &Document,
    provenance: &Provenance,
) -> Result<Option<RunRecord>> {
    let current = require_open(conn, run)?;

    let feed_changes = changed_attributes(&current.feed_attributes, observed_feed);
    if feed_changes.is_empty() {
        return Ok(None);
    }

    record_change(conn, run, &feed_changes, &Document::new(), false, provenance).map(Some)
}

/// Move a run to another lifecycle state.
///
/// Sign-off additionally requires a non-empty `class` and a recorded
/// verdict in every `*_status` component attribute.
///
/// # Errors
///
/// [`Error::RunNotFound`]; [`Error::InvalidStateTransition`] for a no-op
/// transition; [`Error::IncompleteSignoff`] when validation fails;
/// [`Error::MissingActor`]; storage failures with context.
pub fn move_to(
    conn: &mut Connection,
    run: RunNumber,
    to_state: RunState,
    provenance: &Provenance,
) -> Result<RunRecord> {
    let current = get(conn, run)?.ok_or(Error::RunNotFound { run })?;

    if current.state() == Some(to_state) {
        return Err(Error::InvalidStateTransition {
            run,
            from: to_state.as_str().to_string(),
            to: to_state.as_str().to_string(),
        }
        .into());
    }

    if to_state == RunState::Signoff {
        validate_signoff(run, &current)?;
    }

    let mut reviewer = Document::new();
    reviewer.insert("state", Value::String(to_state.as_str().to_string()));
    record_change(conn, run, &Document::new(), &reviewer, false, provenance)
}

/// Flag a run as significant. One-way and only while `OPEN`.
///
/// # Errors
///
/// [`Error::RunNotFound`]; [`Error::RunNotOpen`];
/// [`Error::AlreadySignificant`]; [`Error::MissingActor`]; storage failures
/// with context.
pub fn mark_significant(
    conn: &mut Connection,
    run: RunNumber,
    provenance: &Provenance,
) -> Result<RunRecord> {
    let current = require_open(conn, run)?;
    if current.is_significant() {
        return Err(Error::AlreadySignificant { run }.into());
    }

    let mut reviewer = Document::new();
    reviewer.insert("significant", Value::Bool(true));
    record_change(conn, run, &Document::new(), &reviewer, false, provenance)
}

/// Load one run projection row.
///
/// # Errors
///
/// Returns an error on query failure or corrupt stored attributes.
pub fn get(conn: &Connection, run: RunNumber) -> Result<Option<RunRecord>> {
    let row = conn
        .query_row(
            "SELECT feed_attributes, reviewer_attributes, deleted, version
             FROM runs WHERE run_number = ?1",
            [run],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, Version>(3)?,
                ))
            },
        )
        .optional()
        .with_context(|| format!("read run {run}"))?;

    row.map(|(feed, reviewer, deleted, version)| {
        Ok(RunRecord {
            run,
            feed_attributes: serde_json::from_str(&feed)
                .with_context(|| format!("parse feed attributes of run {run}"))?,
            reviewer_attributes: serde_json::from_str(&reviewer)
                .with_context(|| format!("parse reviewer attributes of run {run}"))?,
            deleted,
            version,
        })
    })
    .transpose()
}

/// The most recently recorded runs, newest run number first.
///
/// Feed synchronization compares its observed batch against this window.
///
/// # Errors
///
/// Returns an error on query failure or corrupt stored attributes.
pub fn latest(conn: &Connection, limit: u32) -> Result<Vec<RunRecord>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT run_number, feed_attributes, reviewer_attributes, deleted, version
             FROM runs ORDER BY run_number DESC LIMIT ?1",
        )
        .context("prepare latest runs query")?;

    let rows = stmt
        .query_map([limit], |row| {
            Ok((
                row.get::<_, RunNumber>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, Version>(4)?,
            ))
        })
        .context("query latest runs")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read latest run rows")?;

    rows.into_iter()
        .map(|(run, feed, reviewer, deleted, version)| {
            Ok(RunRecord {
                run,
                feed_attributes: serde_json::from_str(&feed)
                    .with_context(|| format!("parse feed attributes of run {run}"))?,
                reviewer_attributes: serde_json::from_str(&reviewer)
                    .with_context(|| format!("parse reviewer attributes of run {run}"))?,
                deleted,
                version,
            })
        })
        .collect()
}

/// Full change history of a run, oldest first, with authorship.
///
/// # Errors
///
/// Returns an error on query failure or corrupt stored rows.
pub fn history(conn: &Connection, run: RunNumber) -> Result<Vec<RunEventRecord>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT re.version, e.actor, e.comment, e.created_at, fd.body, rd.body, re.deleted
             FROM run_events re
             JOIN events e ON e.version = re.version
             JOIN documents fd ON fd.id = re.feed_document_id
             JOIN documents rd ON rd.id = re.reviewer_document_id
             WHERE re.run_number = ?1
             ORDER BY re.version",
        )
        .context("prepare run history query")?;

    let rows = stmt
        .query_map([run], |row| {
            Ok((
                row.get::<_, Version>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, bool>(6)?,
            ))
        })
        .context("query run history")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read run history rows")?;

    rows.into_iter()
        .map(
            |(version, actor, comment, created_at, feed, reviewer, deleted)| {
                Ok(RunEventRecord {
                    version,
                    actor,
                    comment,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .with_context(|| format!("parse created_at of event {version}"))?
                        .with_timezone(&Utc),
                    feed_changes: serde_json::from_str(&feed)
                        .with_context(|| format!("parse feed changes of event {version}"))?,
                    reviewer_changes: serde_json::from_str(&reviewer)
                        .with_context(|| format!("parse reviewer changes of event {version}"))?,
                    deleted,
                })
            },
        )
        .collect()
}

/// Write one run event and recompute the projection, as one transaction.
fn record_change(
    conn: &mut Connection,
    run: RunNumber,
    feed: &Document,
    reviewer: &Document,
    deleted: bool,
    provenance: &Provenance,
) -> Result<RunRecord> {
    provenance.validate()?;
    let version = events::allocate_version(conn)?;

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| classify_conflict(err, run, "attributes", version))?;

    let record = (|| -> Result<RunRecord> {
        let feed_id = dedup::intern(&tx, feed)?;
        let reviewer_id = dedup::intern(&tx, reviewer)?;
        events::append(&tx, version, provenance)?;
        tx.execute(
            "INSERT INTO run_events
                 (version, run_number, feed_document_id, reviewer_document_id, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![version, run, feed_id, reviewer_id, deleted],
        )
        .with_context(|| format!("insert run event version {version}"))?;
        recompute_projection(&tx, run)
    })();

    match record {
        Ok(record) => {
            tx.commit()
                .map_err(|err| classify_conflict(err, run, "attributes", version))?;
            tracing::info!(run, version, actor = %provenance.actor, "recorded run change");
            Ok(record)
        }
        Err(err) => {
            drop(tx);
            tracing::warn!(run, version, error = %err, "run change rolled back");
            Err(err.context(format!("record change to run {run} (version {version})")))
        }
    }
}

/// Recompute the run projection from the full event history.
///
/// Merged attributes across all versions in ascending order, soft-delete
/// flag and version from the latest event.
fn recompute_projection(conn: &Connection, run: RunNumber) -> Result<RunRecord> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT re.version, fd.body, rd.body, re.deleted
             FROM run_events re
             JOIN documents fd ON fd.id = re.feed_document_id
             JOIN documents rd ON rd.id = re.reviewer_document_id
             WHERE re.run_number = ?1
             ORDER BY re.version",
        )
        .context("prepare projection recompute query")?;

    let rows = stmt
        .query_map([run], |row| {
            Ok((
                row.get::<_, Version>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })
        .context("query run events for projection")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read run events for projection")?;

    anyhow::ensure!(!rows.is_empty(), "no events to project for run {run}");

    let mut feed_docs = Vec::with_capacity(rows.len());
    let mut reviewer_docs = Vec::with_capacity(rows.len());
    let mut deleted = false;
    let mut version = 0;
    for (event_version, feed, reviewer, event_deleted) in rows {
        feed_docs.push(
            serde_json::from_str(&feed)
                .with_context(|| format!("parse feed changes of event {event_version}"))?,
        );
        reviewer_docs.push(
            serde_json::from_str(&reviewer)
                .with_context(|| format!("parse reviewer changes of event {event_version}"))?,
        );
        deleted = event_deleted;
        version = event_version;
    }

    let record = RunRecord {
        run,
        feed_attributes: merge_ordered(feed_docs),
        reviewer_attributes: merge_ordered(reviewer_docs),
        deleted,
        version,
    };

    conn.execute(
        "INSERT INTO runs (run_number, feed_attributes, reviewer_attributes, deleted, version)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(run_number) DO UPDATE SET
             feed_attributes = excluded.feed_attributes,
             reviewer_attributes = excluded.reviewer_attributes,
             deleted = excluded.deleted,
             version = excluded.version",
        params![
            run,
            record.feed_attributes.canonical_json(),
            record.reviewer_attributes.canonical_json(),
            record.deleted,
            record.version,
        ],
    )
    .with_context(|| format!("upsert run projection {run}"))?;

    Ok(record)
}

/// Guard shared by every edit path: the run must exist and be `OPEN`.
pub(crate) fn require_open(conn: &Connection, run: RunNumber) -> Result<RunRecord> {
    let current = get(conn, run)?.ok_or(Error::RunNotFound { run })?;
    match current.state() {
        Some(RunState::Open) => Ok(current),
        state => Err(Error::RunNotOpen {
            run,
            state: state.map_or_else(|| "unknown".to_string(), |s| s.as_str().to_string()),
        }
        .into()),
    }
}

fn validate_signoff(run: RunNumber, current: &RunRecord) -> Result<()> {
    let class_ok = current
        .reviewer_attributes
        .get("class")
        .and_then(Value::as_str)
        .is_some_and(|class| !class.is_empty());
    if !class_ok {
        return Err(Error::IncompleteSignoff {
            run,
            attribute: "class".to_string(),
        }
        .into());
    }

    for (key, value) in &current.reviewer_attributes {
        if !key.ends_with("_status") {
            continue;
        }
        let status = value.get("status").and_then(Value::as_str).unwrap_or("");
        if status.is_empty() || status == "NO VALUE FOUND" {
            return Err(Error::IncompleteSignoff {
                run,
                attribute: key.clone(),
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_ledger_in_memory;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        Document::from_value(value).expect("object value")
    }

    fn shifter() -> Provenance {
        Provenance::new("shifter@example.org", "test change")
    }

    fn create_default(conn: &mut Connection, run: RunNumber) -> RunRecord {
        create(
            conn,
            run,
            &doc(json!({"energy": 6800, "beams_stable": true})),
            &doc(json!({"class": "Collisions26", "dt_status": {"status": "GOOD"}})),
            &shifter(),
        )
        .expect("create run")
    }

    #[test]
    fn create_defaults_state_to_open() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        let record = create_default(&mut conn, 355_001);
        assert_eq!(record.state(), Some(RunState::Open));
        assert_eq!(record.version, 1);
    }

    #[test]
    fn create_twice_is_an_error() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        create_default(&mut conn, 355_001);
        let err = create(
            &mut conn,
            355_001,
            &Document::new(),
            &Document::new(),
            &shifter(),
        )
        .expect_err("duplicate");
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::RunExists { run: 355_001 })
        );
    }

    #[test]
    fn edit_stores_only_changed_attributes() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        create_default(&mut conn, 355_001);

        let record = edit(
            &mut conn,
            355_001,
            &doc(json!({"energy": 6800})),
            &doc(json!({"class": "Collisions26", "dt_status": {"status": "BAD"}})),
            &shifter(),
        )
        .expect("edit")
        .expect("a change was stored");

        assert_eq!(
            record.reviewer_attributes.get("dt_status"),
            Some(&json!({"status": "BAD"}))
        );
        // unchanged class persisted through the merge
        assert_eq!(
            record.reviewer_attributes.get("class"),
            Some(&json!("Collisions26"))
        );

        let events = history(&conn, 355_001).expect("history");
        assert_eq!(events.len(), 2);
        let last = events.last().expect("non-empty");
        // the stored event carries only the delta
        assert!(last.reviewer_changes.get("class").is_none());
        assert_eq!(
            last.reviewer_changes.get("dt_status"),
            Some(&json!({"status": "BAD"}))
        );
    }

    #[test]
    fn edit_without_reviewer_changes_writes_nothing() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        let created = create_default(&mut conn, 355_001);

        let result = edit(
            &mut conn,
            355_001,
            &doc(json!({"energy": 7000})),
            &created.reviewer_attributes,
            &shifter(),
        )
        .expect("edit");
        assert!(result.is_none());
        assert_eq!(history(&conn, 355_001).expect("history").len(), 1);
    }

    #[test]
    fn refresh_from_feed_stores_feed_delta() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        create_default(&mut conn, 355_001);

        let record = refresh_from_feed(
            &mut conn,
            355_001,
            &doc(json!({"energy": 6800, "beams_stable": false})),
            &Provenance::new("dqm-bot", "auto refresh"),
        )
        .expect("refresh")
        .expect("a change was stored");
        assert_eq!(
            record.feed_attributes.get("beams_stable"),
            Some(&json!(false))
        );
        assert_eq!(record.feed_attributes.get("energy"), Some(&json!(6800)));

        // identical observation: nothing new
        let unchanged = refresh_from_feed(
            &mut conn,
            355_001,
            &doc(json!({"energy": 6800, "beams_stable": false})),
            &Provenance::new("dqm-bot", "auto refresh"),
        )
        .expect("refresh");
        assert!(unchanged.is_none());
    }

    #[test]
    fn projection_version_tracks_max_event() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        create_default(&mut conn, 355_001);
        let record = edit(
            &mut conn,
            355_001,
            &Document::new(),
            &doc(json!({"class": "Cosmics26"})),
            &shifter(),
        )
        .expect("edit")
        .expect("stored");
        assert_eq!(record.version, 2);

        let reread = get(&conn, 355_001).expect("read").expect("present");
        assert_eq!(reread.version, 2);
        assert_eq!(reread, record);
    }

    #[test]
    fn edit_requires_open_state() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        create_default(&mut conn, 355_001);
        move_to(&mut conn, 355_001, RunState::Signoff, &shifter()).expect("signoff");

        let err = edit(
            &mut conn,
            355_001,
            &Document::new(),
            &doc(json!({"class": "X"})),
            &shifter(),
        )
        .expect_err("must refuse");
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::RunNotOpen {
                run: 355_001,
                state: "SIGNOFF".to_string()
            })
        );
    }

    #[test]
    fn move_to_same_state_is_rejected() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        create_default(&mut conn, 355_001);
        let err = move_to(&mut conn, 355_001, RunState::Open, &shifter()).expect_err("no-op");
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn signoff_requires_component_verdicts() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        create(
            &mut conn,
            355_001,
            &Document::new(),
            &doc(json!({
                "class": "Collisions26",
                "dt_status": {"status": "GOOD"},
                "csc_status": {"status": ""}
            })),
            &shifter(),
        )
        .expect("create");

        let err = move_to(&mut conn, 355_001, RunState::Signoff, &shifter()).expect_err("refuse");
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::IncompleteSignoff {
                run: 355_001,
                attribute: "csc_status".to_string()
            })
        );
    }

    #[test]
    fn signoff_requires_class() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        create(
            &mut conn,
            355_001,
            &Document::new(),
            &doc(json!({"dt_status": {"status": "GOOD"}})),
            &shifter(),
        )
        .expect("create");

        let err = move_to(&mut conn, 355_001, RunState::Signoff, &shifter()).expect_err("refuse");
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::IncompleteSignoff {
                run: 355_001,
                attribute: "class".to_string()
            })
        );
    }

    #[test]
    fn mark_significant_is_one_way() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        create_default(&mut conn, 355_001);
        let record = mark_significant(&mut conn, 355_001, &shifter()).expect("flag");
        assert!(record.is_significant());

        let err = mark_significant(&mut conn, 355_001, &shifter()).expect_err("twice");
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::AlreadySignificant { run: 355_001 })
        );
    }

    #[test]
    fn history_carries_authorship_in_version_order() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        create_default(&mut conn, 355_001);
        edit(
            &mut conn,
            355_001,
            &Document::new(),
            &doc(json!({"class": "Cosmics26"})),
            &Provenance::new("expert@example.org", "reclassified"),
        )
        .expect("edit")
        .expect("stored");

        let events = history(&conn, 355_001).expect("history");
        assert_eq!(events.len(), 2);
        assert!(events[0].version < events[1].version);
        assert_eq!(events[1].actor, "expert@example.org");
        assert_eq!(events[1].comment, "reclassified");
    }

    #[test]
    fn missing_run_is_not_found() {
        let mut conn = open_ledger_in_memory().expect("open ledger");
        let err = move_to(&mut conn, 9, RunState::Signoff, &shifter()).expect_err("missing");
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::RunNotFound { run: 9 })
        );
    }
}
