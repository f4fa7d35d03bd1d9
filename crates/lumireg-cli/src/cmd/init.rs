//! `lr init` — create the ledger database.

use super::CmdContext;
use crate::output::render;
use anyhow::Result;
use lumireg_store::Store;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct InitReport {
    database: String,
    schema_version: u32,
}

/// Open (creating if needed) and migrate the ledger database.
///
/// # Errors
///
/// Returns an error if the database cannot be created or migrated.
pub fn run_init(ctx: &CmdContext) -> Result<()> {
    drop(Store::open(&ctx.db_path)?);
    tracing::info!(path = %ctx.db_path.display(), "ledger initialized");

    let report = InitReport {
        database: ctx.db_path.display().to_string(),
        schema_version: lumireg_store::db::migrations::LATEST_SCHEMA_VERSION,
    };
    render(ctx.output, &report, |report, w| {
        writeln!(
            w,
            "Initialized ledger at {} (schema v{})",
            report.database, report.schema_version
        )
    })
}
