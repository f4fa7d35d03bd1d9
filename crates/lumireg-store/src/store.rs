//! The ledger facade.
//!
//! [`Store`] owns one SQLite connection and wires the pieces together:
//! change requests run through the differential updater, documents are
//! interned, events appended, assignments expanded — and after a committed
//! change the registered listeners hear which dataset moved.

use crate::apply::{self, with_conflict_retry};
use crate::datasets::DatasetRecord;
use crate::events::Provenance;
use crate::notify::{ChangeListener, DatasetChanged};
use crate::runs::{RunEventRecord, RunRecord, RunState};
use crate::{datasets, db, reconstruct, runs};
use anyhow::{Context, Result};
use lumireg_core::compact::{Range, compact};
use lumireg_core::config::LedgerConfig;
use lumireg_core::diff::diff_ranges;
use lumireg_core::model::{RunNumber, Source, Version};
use lumireg_core::{Document, Whitelist};
use rusqlite::Connection;
use std::path::Path;

/// How many times a lumisection update is retried after losing a
/// transaction race, each time from a fresh reconstruction.
const CONFLICT_RETRIES: u32 = 2;

/// Everything needed to register a run for the first time.
///
/// Mirrors the shape the request boundary hands over: both attribute sets
/// plus the initial dense lumisection sequences per source.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NewRun {
    /// Accelerator-assigned run number.
    pub run: RunNumber,
    /// Initial feed attributes.
    pub feed_attributes: Document,
    /// Initial reviewer attributes.
    pub reviewer_attributes: Document,
    /// Dense feed-sourced lumisection documents, slice 1 first.
    pub feed_lumisections: Vec<Document>,
    /// Dense reviewer-sourced lumisection documents, slice 1 first.
    pub reviewer_lumisections: Vec<Document>,
}

/// A full observed update for an open run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunUpdate {
    /// Observed feed attributes.
    pub feed_attributes: Document,
    /// Observed reviewer attributes.
    pub reviewer_attributes: Document,
    /// Observed dense feed-sourced lumisections.
    pub feed_lumisections: Vec<Document>,
    /// Observed dense reviewer-sourced lumisections.
    pub reviewer_lumisections: Vec<Document>,
}

/// The online dataset every run starts with.
pub const ONLINE_DATASET: &str = "online";

/// One open ledger.
pub struct Store {
    conn: Connection,
    listeners: Vec<Box<dyn ChangeListener>>,
}

impl Store {
    /// Open (or create) the ledger at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: db::open_ledger(path)?,
            listeners: Vec::new(),
        })
    }

    /// Open an in-memory ledger. Test support.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be configured or migrated.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: db::open_ledger_in_memory()?,
            listeners: Vec::new(),
        })
    }

    /// Register a listener for post-commit dataset-changed notifications.
    pub fn subscribe(&mut self, listener: Box<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    // -----------------------------------------------------------------------
    // Lumisections
    // -----------------------------------------------------------------------

    /// Store an initial dense lumisection sequence, compacted into ranges.
    ///
    /// Each range becomes one event + assignment batch. Returns the ranges
    /// written.
    ///
    /// # Errors
    ///
    /// Attribution and storage failures; see [`apply::apply_range`].
    pub fn create_lumisections(
        &mut self,
        run: RunNumber,
        dataset: &str,
        source: Source,
        observed: &[Document],
        whitelist: &Whitelist,
        provenance: &Provenance,
    ) -> Result<Vec<Range>> {
        let ranges = compact(observed, whitelist);
        apply::apply_ranges(&mut self.conn, run, dataset, source, &ranges, provenance)?;
        if let Some(version) = self.bump_dataset(run, dataset)? {
            self.emit(DatasetChanged {
                run,
                dataset: dataset.to_string(),
                version,
            });
        }
        Ok(ranges)
    }

    /// Converge stored lumisections to a newly observed dense sequence.
    ///
    /// Reconstructs the current state, computes the minimal changed ranges,
    /// and applies each as one transactional batch. A lost transaction race
    /// is retried from a fresh reconstruction. An observation that changes
    /// nothing writes nothing.
    ///
    /// # Errors
    ///
    /// [`lumireg_core::Error::LengthMismatch`] when the observed sequence
    /// disagrees with the stored length (nothing is written); attribution
    /// and storage failures otherwise.
    pub fn update_lumisections(
        &mut self,
        run: RunNumber,
        dataset: &str,
        source: Source,
        observed: &[Document],
        whitelist: &Whitelist,
        provenance: &Provenance,
    ) -> Result<Vec<Range>> {
        let conn = &mut self.conn;
        let ranges = with_conflict_retry(CONFLICT_RETRIES, || {
            let previous = reconstruct::reconstruct(conn, run, dataset, source)?;
            let ranges = diff_ranges(&previous, observed, whitelist)?;
            apply::apply_ranges(conn, run, dataset, source, &ranges, provenance)?;
            Ok(ranges)
        })?;

        if !ranges.is_empty() {
            if let Some(version) = self.bump_dataset(run, dataset)? {
                self.emit(DatasetChanged {
                    run,
                    dataset: dataset.to_string(),
                    version,
                });
            }
        }
        Ok(ranges)
    }

    /// Reconstruct the dense per-slice values of `(run, dataset, source)`.
    ///
    /// # Errors
    ///
    /// See [`reconstruct::reconstruct`].
    pub fn reconstruct(
        &self,
        run: RunNumber,
        dataset: &str,
        source: Source,
    ) -> Result<Vec<Document>> {
        reconstruct::reconstruct(&self.conn, run, dataset, source)
    }

    /// The compact range view of a reconstruction.
    ///
    /// # Errors
    ///
    /// See [`reconstruct::ranges`].
    pub fn ranges(
        &self,
        run: RunNumber,
        dataset: &str,
        source: Source,
        whitelist: &Whitelist,
    ) -> Result<Vec<Range>> {
        reconstruct::ranges(&self.conn, run, dataset, source, whitelist)
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Register a run: attributes, the `online` dataset, and the initial
    /// lumisections of both sources.
    ///
    /// # Errors
    ///
    /// [`lumireg_core::Error::RunExists`] when the run is already stored;
    /// attribution and storage failures otherwise.
    pub fn create_run(
        &mut self,
        new_run: &NewRun,
        config: &LedgerConfig,
        provenance: &Provenance,
    ) -> Result<RunRecord> {
        let record = runs::create(
            &mut self.conn,
            new_run.run,
            &new_run.feed_attributes,
            &new_run.reviewer_attributes,
            provenance,
        )?;
        datasets::upsert(
            &self.conn,
            new_run.run,
            ONLINE_DATASET,
            &Document::new(),
            record.version,
        )?;

        if !new_run.reviewer_lumisections.is_empty() {
            self.create_lumisections(
                new_run.run,
                ONLINE_DATASET,
                Source::Feed,
                &new_run.feed_lumisections,
                &config.whitelist_for(Source::Feed),
                provenance,
            )?;
            self.create_lumisections(
                new_run.run,
                ONLINE_DATASET,
                Source::Reviewer,
                &new_run.reviewer_lumisections,
                &config.whitelist_for(Source::Reviewer),
                provenance,
            )?;
        }

        tracing::info!(run = new_run.run, version = record.version, "registered run");
        Ok(record)
    }

    /// Apply a full observed update to an open run.
    ///
    /// Reviewer lumisections are converged first; when they changed, the
    /// feed lumisections are converged too and the dataset version bumped.
    /// Run attributes store only their changed keys, and only when a
    /// reviewer attribute actually changed.
    ///
    /// # Errors
    ///
    /// [`lumireg_core::Error::RunNotFound`] /
    /// [`lumireg_core::Error::RunNotOpen`] guard failures; length-mismatch,
    /// attribution, and storage failures from the parts.
    pub fn edit_run(
        &mut self,
        run: RunNumber,
        update: &RunUpdate,
        config: &LedgerConfig,
        provenance: &Provenance,
    ) -> Result<RunRecord> {
        runs::require_open(&self.conn, run)?;

        let reviewer_ranges = self.update_lumisections(
            run,
            ONLINE_DATASET,
            Source::Reviewer,
            &update.reviewer_lumisections,
            &config.whitelist_for(Source::Reviewer),
            provenance,
        )?;
        if !reviewer_ranges.is_empty() {
            self.update_lumisections(
                run,
                ONLINE_DATASET,
                Source::Feed,
                &update.feed_lumisections,
                &config.whitelist_for(Source::Feed),
                provenance,
            )?;
        }

        let edited = runs::edit(
            &mut self.conn,
            run,
            &update.feed_attributes,
            &update.reviewer_attributes,
            provenance,
        )?;

        match edited {
            Some(record) => Ok(record),
            None => runs::get(&self.conn, run)?
                .context("run row disappeared during edit"),
        }
    }

    /// Converge a run's stored feed attributes to an observed set.
    ///
    /// # Errors
    ///
    /// See [`runs::refresh_from_feed`].
    pub fn refresh_run_from_feed(
        &mut self,
        run: RunNumber,
        observed_feed: &Document,
        provenance: &Provenance,
    ) -> Result<Option<RunRecord>> {
        runs::refresh_from_feed(&mut self.conn, run, observed_feed, provenance)
    }

    /// Move a run to another lifecycle state.
    ///
    /// # Errors
    ///
    /// See [`runs::move_to`].
    pub fn move_run(
        &mut self,
        run: RunNumber,
        to_state: RunState,
        provenance: &Provenance,
    ) -> Result<RunRecord> {
        runs::move_to(&mut self.conn, run, to_state, provenance)
    }

    /// Flag a run as significant.
    ///
    /// # Errors
    ///
    /// See [`runs::mark_significant`].
    pub fn mark_significant(
        &mut self,
        run: RunNumber,
        provenance: &Provenance,
    ) -> Result<RunRecord> {
        runs::mark_significant(&mut self.conn, run, provenance)
    }

    /// Load one run projection row.
    ///
    /// # Errors
    ///
    /// See [`runs::get`].
    pub fn run(&self, run: RunNumber) -> Result<Option<RunRecord>> {
        runs::get(&self.conn, run)
    }

    /// The most recently recorded runs, newest first.
    ///
    /// # Errors
    ///
    /// See [`runs::latest`].
    pub fn latest_runs(&self, limit: u32) -> Result<Vec<RunRecord>> {
        runs::latest(&self.conn, limit)
    }

    /// Full change history of a run.
    ///
    /// # Errors
    ///
    /// See [`runs::history`].
    pub fn run_history(&self, run: RunNumber) -> Result<Vec<RunEventRecord>> {
        runs::history(&self.conn, run)
    }

    /// Load one dataset projection row.
    ///
    /// # Errors
    ///
    /// See [`datasets::get`].
    pub fn dataset(&self, run: RunNumber, name: &str) -> Result<Option<DatasetRecord>> {
        datasets::get(&self.conn, run, name)
    }

    /// All dataset rows of a run.
    ///
    /// # Errors
    ///
    /// See [`datasets::for_run`].
    pub fn datasets_for_run(&self, run: RunNumber) -> Result<Vec<DatasetRecord>> {
        datasets::for_run(&self.conn, run)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Raise the dataset row to the highest version any slice event of the
    /// dataset carries. Returns that version, or `None` when the dataset
    /// has no slice events at all.
    fn bump_dataset(&self, run: RunNumber, dataset: &str) -> Result<Option<Version>> {
        let max_version: Option<Version> = self
            .conn
            .query_row(
                "SELECT MAX(version) FROM slice_events
                 WHERE run_number = ?1 AND dataset = ?2",
                rusqlite::params![run, dataset],
                |row| row.get(0),
            )
            .with_context(|| format!("max slice event version of dataset '{dataset}'"))?;

        let Some(version) = max_version else {
            return Ok(None);
        };
        datasets::upsert(&self.conn, run, dataset, &Document::new(), version)?;
        Ok(Some(version))
    }

    fn emit(&self, change: DatasetChanged) {
        tracing::debug!(
            run = change.run,
            dataset = %change.dataset,
            version = change.version,
            "dataset changed"
        );
        for listener in &self.listeners {
            listener.dataset_changed(&change);
        }
    }
}
