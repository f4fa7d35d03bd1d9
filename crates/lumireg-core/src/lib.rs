//! Core domain logic for the lumireg quality ledger.
//!
//! Everything in this crate is pure with respect to storage: attribute
//! documents, whitelist restriction, version-ordered merging, range
//! compaction, and differential range computation. Persistence lives in
//! `lumireg-store`.
//!
//! # Conventions
//!
//! - **Errors**: the [`error::Error`] taxonomy for domain failures,
//!   `anyhow::Result` at I/O seams (config loading).
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

#![forbid(unsafe_code)]

pub mod compact;
pub mod config;
pub mod diff;
pub mod document;
pub mod error;
pub mod merge;
pub mod model;
pub mod whitelist;

pub use compact::{Range, compact};
pub use diff::diff_ranges;
pub use document::Document;
pub use error::Error;
pub use whitelist::Whitelist;
