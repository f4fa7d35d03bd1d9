//! SQLite-backed persistence for the lumireg quality ledger.
//!
//! The store is event-sourced: events, documents, and slice assignments are
//! append-only; the run and dataset rows are merge-on-write projections
//! recomputed inside the writing transaction. Reads go through WAL
//! snapshots and never block writers.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` with context at every seam; domain
//!   failures are `lumireg_core::Error` values, recoverable via
//!   `downcast_ref`.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

#![forbid(unsafe_code)]

pub mod apply;
pub mod assignments;
pub mod datasets;
pub mod db;
pub mod dedup;
pub mod detect;
pub mod events;
pub mod notify;
pub mod reconstruct;
pub mod runs;
pub mod store;

pub use events::Provenance;
pub use notify::{ChangeListener, DatasetChanged};
pub use store::Store;
