//! Command handlers.

pub mod init;
pub mod run;
pub mod slices;

use crate::output::OutputMode;
use lumireg_core::config::LedgerConfig;
use lumireg_store::Provenance;
use std::path::PathBuf;

/// Everything a command handler needs besides its own arguments.
pub struct CmdContext {
    /// Path to the ledger database.
    pub db_path: PathBuf,
    /// Loaded whitelist configuration.
    pub config: LedgerConfig,
    /// Output mode derived from flags.
    pub output: OutputMode,
    /// Authorship for mutating commands.
    pub provenance: Provenance,
}
