//! The append-only event log and its version allocator.
//!
//! Every mutation is recorded as one event row carrying authorship: who
//! (actor), why (comment), and when. Versions are allocated from a
//! persistent single-row counter *outside* the write transaction, so a
//! rolled-back operation permanently skips its version — strictly
//! increasing, never reused, holes legal.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lumireg_core::Error;
use lumireg_core::model::Version;
use rusqlite::{Connection, OptionalExtension, params};

/// Authorship metadata required on every mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Who is making the change. Must be non-empty.
    pub actor: String,
    /// Free-form reason for the change.
    pub comment: String,
}

impl Provenance {
    /// Build provenance from actor and comment.
    #[must_use]
    pub fn new(actor: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            comment: comment.into(),
        }
    }

    /// Enforce the attribution precondition.
    ///
    /// # Errors
    ///
    /// [`Error::MissingActor`] when the actor is empty or whitespace. This
    /// check runs before any other side effect of a change operation.
    pub fn validate(&self) -> Result<(), Error> {
        if self.actor.trim().is_empty() {
            return Err(Error::MissingActor);
        }
        Ok(())
    }
}

/// One committed event-log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Store-global version assigned by the allocator.
    pub version: Version,
    /// Who made the change.
    pub actor: String,
    /// Why.
    pub comment: String,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// Allocate the next version.
///
/// Runs as its own atomic statement in autocommit mode, deliberately not
/// inside the caller's transaction: if the operation later rolls back, the
/// consumed version stays consumed.
///
/// # Errors
///
/// Returns an error if the counter update fails.
pub fn allocate_version(conn: &Connection) -> Result<Version> {
    let version: Version = conn
        .query_row(
            "UPDATE version_counter SET value = value + 1 WHERE id = 1 RETURNING value",
            [],
            |row| row.get(0),
        )
        .context("allocate next event version")?;
    tracing::trace!(version, "allocated event version");
    Ok(version)
}

/// Append one event row under an already-allocated version.
///
/// Callers run this inside their write transaction so the event becomes
/// visible together with the rows that reference it.
///
/// # Errors
///
/// [`Error::MissingActor`] if the provenance fails validation; otherwise
/// any SQLite failure with context.
pub fn append(conn: &Connection, version: Version, provenance: &Provenance) -> Result<Event> {
    provenance.validate()?;

    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO events (version, actor, comment, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            version,
            provenance.actor,
            provenance.comment,
            created_at.to_rfc3339(),
        ],
    )
    .with_context(|| format!("append event version {version}"))?;

    Ok(Event {
        version,
        actor: provenance.actor.clone(),
        comment: provenance.comment.clone(),
        created_at,
    })
}

/// Read back one event by version.
///
/// # Errors
///
/// Returns an error on query failure or an unparsable stored timestamp.
pub fn get(conn: &Connection, version: Version) -> Result<Option<Event>> {
    let row = conn
        .query_row(
            "SELECT version, actor, comment, created_at FROM events WHERE version = ?1",
            [version],
            |row| {
                Ok((
                    row.get::<_, Version>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()
        .with_context(|| format!("read event version {version}"))?;

    row.map(|(version, actor, comment, created_at)| {
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .with_context(|| format!("parse created_at of event {version}"))?
            .with_timezone(&Utc);
        Ok(Event {
            version,
            actor,
            comment,
            created_at,
        })
    })
    .transpose()
}
