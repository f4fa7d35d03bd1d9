//! Content-addressed attribute-document store.
//!
//! Repeated attribute documents are stored once: interning hashes the
//! canonical JSON rendering and relies on the `UNIQUE(content_hash)`
//! constraint — not client-side locking — as the source of truth. A caller
//! that loses a concurrent race to insert re-reads and returns the
//! winner's id.

use anyhow::{Context, Result};
use lumireg_core::{Document, Error};
use rusqlite::{Connection, OptionalExtension, params};

/// Identifier of a stored document row.
pub type DocumentId = i64;

/// Return the id of a stored document deep-equal to `document`, inserting
/// it first if no such row exists.
///
/// Safe under concurrent callers racing to intern the same new document:
/// the insert uses `ON CONFLICT DO NOTHING` and the lookup retries once
/// against the winner row.
///
/// # Errors
///
/// [`Error::DocumentInternFailed`] if the row can neither be inserted nor
/// found after the retry; otherwise any SQLite failure with context.
pub fn intern(conn: &Connection, document: &Document) -> Result<DocumentId> {
    let content_hash = document.content_hash();

    if let Some(id) = lookup(conn, &content_hash)? {
        tracing::trace!(%content_hash, id, "document already interned");
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO documents (content_hash, body) VALUES (?1, ?2)
         ON CONFLICT(content_hash) DO NOTHING",
        params![content_hash, document.canonical_json()],
    )
    .with_context(|| format!("intern document {content_hash}"))?;

    // Either we inserted it or a concurrent writer won; the row exists
    // either way, so a missing row here is a hard failure.
    lookup(conn, &content_hash)?.ok_or_else(|| {
        Error::DocumentInternFailed {
            content_hash: content_hash.clone(),
        }
        .into()
    })
}

/// Load a stored document by id.
///
/// # Errors
///
/// Returns an error on query failure, a missing row, or an unparsable body.
pub fn load(conn: &Connection, id: DocumentId) -> Result<Document> {
    let body: String = conn
        .query_row("SELECT body FROM documents WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .with_context(|| format!("load document {id}"))?;
    serde_json::from_str(&body).with_context(|| format!("parse stored document {id}"))
}

fn lookup(conn: &Connection, content_hash: &str) -> Result<Option<DocumentId>> {
    conn.query_row(
        "SELECT id FROM documents WHERE content_hash = ?1",
        [content_hash],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("look up document {content_hash}"))
}
