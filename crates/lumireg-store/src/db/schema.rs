//! Canonical SQLite schema for the ledger.
//!
//! Append-only tables carry the history: `events` (authorship), `documents`
//! (content-addressed attribute sets), `slice_events` and
//! `slice_assignments` (which versions touch which slices), `run_events`
//! (run-level changes). `runs` and `datasets` are mutable merge-on-write
//! projections; they are only ever written by projection recomputation.

/// Migration v1: event log, dedup store, assignment index, projections.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS version_counter (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    value INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO version_counter (id, value) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS events (
    version INTEGER PRIMARY KEY,
    actor TEXT NOT NULL CHECK (length(trim(actor)) > 0),
    comment TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_hash TEXT NOT NULL UNIQUE,
    body TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS slice_events (
    version INTEGER PRIMARY KEY REFERENCES events(version),
    run_number INTEGER NOT NULL CHECK (run_number >= 1),
    dataset TEXT NOT NULL CHECK (length(trim(dataset)) > 0),
    source TEXT NOT NULL CHECK (source IN ('feed', 'reviewer')),
    document_id INTEGER NOT NULL REFERENCES documents(id)
);

CREATE TABLE IF NOT EXISTS slice_assignments (
    version INTEGER NOT NULL REFERENCES slice_events(version),
    slice_number INTEGER NOT NULL CHECK (slice_number >= 1),
    PRIMARY KEY (version, slice_number)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS run_events (
    version INTEGER PRIMARY KEY REFERENCES events(version),
    run_number INTEGER NOT NULL CHECK (run_number >= 1),
    feed_document_id INTEGER NOT NULL REFERENCES documents(id),
    reviewer_document_id INTEGER NOT NULL REFERENCES documents(id),
    deleted INTEGER NOT NULL DEFAULT 0 CHECK (deleted IN (0, 1))
);

CREATE TABLE IF NOT EXISTS runs (
    run_number INTEGER PRIMARY KEY,
    feed_attributes TEXT NOT NULL,
    reviewer_attributes TEXT NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0 CHECK (deleted IN (0, 1)),
    version INTEGER NOT NULL REFERENCES events(version)
);

CREATE TABLE IF NOT EXISTS datasets (
    run_number INTEGER NOT NULL CHECK (run_number >= 1),
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    attributes TEXT NOT NULL DEFAULT '{}',
    version INTEGER NOT NULL REFERENCES events(version),
    PRIMARY KEY (run_number, name)
);
"#;

/// Migration v2: read-path indexes for reconstruction and history queries.
pub const MIGRATION_V2_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_slice_events_run_dataset
    ON slice_events(run_number, dataset, source, version);

CREATE INDEX IF NOT EXISTS idx_slice_assignments_slice
    ON slice_assignments(slice_number, version);

CREATE INDEX IF NOT EXISTS idx_run_events_run
    ON run_events(run_number, version);

CREATE INDEX IF NOT EXISTS idx_datasets_run
    ON datasets(run_number, version);
"#;

/// Indexes expected by the reconstruction/history read paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_slice_events_run_dataset",
    "idx_slice_assignments_slice",
    "idx_run_events_run",
    "idx_datasets_run",
];
