//! Run-level commands: register, edit, refresh, lifecycle, history.

use super::CmdContext;
use crate::output::{kv, render};
use anyhow::{Context, Result};
use clap::Args;
use lumireg_core::Document;
use lumireg_core::model::RunNumber;
use lumireg_store::Store;
use lumireg_store::runs::{RunRecord, RunState};
use lumireg_store::store::{NewRun, RunUpdate};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Arguments for `lr new-run`.
#[derive(Args, Debug)]
pub struct NewRunArgs {
    /// JSON file with the observed run (attributes + lumisections).
    pub file: PathBuf,
}

/// Arguments for `lr edit-run`.
#[derive(Args, Debug)]
pub struct EditRunArgs {
    /// Run number to edit.
    pub run: RunNumber,
    /// JSON file with the observed update.
    pub file: PathBuf,
}

/// Arguments for `lr refresh`.
#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Run number to refresh.
    pub run: RunNumber,
    /// JSON file with the observed feed attributes.
    pub file: PathBuf,
}

/// Arguments for `lr show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Run number to show.
    pub run: RunNumber,
}

/// Arguments for `lr history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Run number whose history to list.
    pub run: RunNumber,
}

/// Arguments for `lr move`.
#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Run number to move.
    pub run: RunNumber,
    /// Target lifecycle state: OPEN, SIGNOFF, or COMPLETED.
    pub state: String,
}

/// Arguments for `lr significant`.
#[derive(Args, Debug)]
pub struct SignificantArgs {
    /// Run number to flag.
    pub run: RunNumber,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))
}

/// Arguments for `lr plan-sync`.
#[derive(Args, Debug)]
pub struct PlanSyncArgs {
    /// JSON file with the observed feed batch: `[{run, feed_attributes}]`.
    pub file: PathBuf,

    /// How many recently stored runs to compare against.
    #[arg(long, default_value_t = 50)]
    pub window: u32,
}

fn print_record(ctx: &CmdContext, record: &RunRecord) -> Result<()> {
    render(ctx.output, record, |record, w| {
        kv(w, "run", record.run.to_string())?;
        kv(
            w,
            "state",
            record
                .state()
                .map_or_else(|| "unknown".to_string(), |s| s.to_string()),
        )?;
        kv(w, "version", record.version.to_string())?;
        kv(w, "significant", record.is_significant().to_string())?;
        kv(w, "feed", record.feed_attributes.canonical_json())?;
        kv(w, "reviewer", record.reviewer_attributes.canonical_json())
    })
}

/// Register a run from an observed JSON file.
///
/// # Errors
///
/// Fails on unreadable input, a duplicate run, or storage failures.
pub fn run_new(args: &NewRunArgs, ctx: &CmdContext) -> Result<()> {
    let new_run: NewRun = read_json(&args.file)?;
    let mut store = Store::open(&ctx.db_path)?;
    let record = store.create_run(&new_run, &ctx.config, &ctx.provenance)?;
    print_record(ctx, &record)
}

/// Apply an observed update to an open run.
///
/// # Errors
///
/// Fails on unreadable input, guard violations, or storage failures.
pub fn run_edit(args: &EditRunArgs, ctx: &CmdContext) -> Result<()> {
    let update: RunUpdate = read_json(&args.file)?;
    let mut store = Store::open(&ctx.db_path)?;
    let record = store.edit_run(args.run, &update, &ctx.config, &ctx.provenance)?;
    print_record(ctx, &record)
}

/// Converge stored feed attributes to an observed set.
///
/// # Errors
///
/// Fails on unreadable input, guard violations, or storage failures.
pub fn run_refresh(args: &RefreshArgs, ctx: &CmdContext) -> Result<()> {
    let observed: Document = read_json(&args.file)?;
    let mut store = Store::open(&ctx.db_path)?;
    match store.refresh_run_from_feed(args.run, &observed, &ctx.provenance)? {
        Some(record) => print_record(ctx, &record),
        None => {
            tracing::info!(run = args.run, "feed attributes unchanged");
            let record = store
                .run(args.run)?
                .context("run disappeared during refresh")?;
            print_record(ctx, &record)
        }
    }
}

/// Show one run's projection row and its datasets.
///
/// # Errors
///
/// Fails when the run is unknown or on storage failures.
pub fn run_show(args: &ShowArgs, ctx: &CmdContext) -> Result<()> {
    #[derive(serde::Serialize)]
    struct ShowReport {
        #[serde(flatten)]
        record: RunRecord,
        datasets: Vec<lumireg_store::datasets::DatasetRecord>,
    }

    let store = Store::open(&ctx.db_path)?;
    let record = store
        .run(args.run)?
        .ok_or(lumireg_core::Error::RunNotFound { run: args.run })?;
    let datasets = store.datasets_for_run(args.run)?;

    let report = ShowReport { record, datasets };
    render(ctx.output, &report, |report, w| {
        kv(w, "run", report.record.run.to_string())?;
        kv(
            w,
            "state",
            report
                .record
                .state()
                .map_or_else(|| "unknown".to_string(), |s| s.to_string()),
        )?;
        kv(w, "version", report.record.version.to_string())?;
        kv(w, "significant", report.record.is_significant().to_string())?;
        kv(w, "feed", report.record.feed_attributes.canonical_json())?;
        kv(
            w,
            "reviewer",
            report.record.reviewer_attributes.canonical_json(),
        )?;
        for dataset in &report.datasets {
            kv(
                w,
                "dataset",
                format!("{} (v{})", dataset.name, dataset.version),
            )?;
        }
        Ok(())
    })
}

/// Compare an observed feed batch against recently stored runs.
///
/// Lists the runs the ledger has never seen and the stored runs whose
/// observed feed attributes drifted.
///
/// # Errors
///
/// Fails on unreadable input or storage failures.
pub fn run_plan_sync(args: &PlanSyncArgs, ctx: &CmdContext) -> Result<()> {
    #[derive(serde::Serialize)]
    struct SyncPlan {
        new: Vec<RunNumber>,
        update: Vec<RunNumber>,
    }

    let observed: Vec<lumireg_store::detect::ObservedRun> = read_json(&args.file)?;
    let store = Store::open(&ctx.db_path)?;
    let stored = store.latest_runs(args.window)?;

    let plan = SyncPlan {
        new: lumireg_store::detect::new_runs(&observed, &stored)
            .iter()
            .map(|o| o.run)
            .collect(),
        update: lumireg_store::detect::runs_to_update(&observed, &stored)
            .iter()
            .map(|o| o.run)
            .collect(),
    };
    render(ctx.output, &plan, |plan, w| {
        writeln!(w, "new runs:       {:?}", plan.new)?;
        writeln!(w, "runs to update: {:?}", plan.update)
    })
}

/// List a run's full change history with authorship.
///
/// # Errors
///
/// Fails on storage failures.
pub fn run_history(args: &HistoryArgs, ctx: &CmdContext) -> Result<()> {
    let store = Store::open(&ctx.db_path)?;
    let history = store.run_history(args.run)?;
    render(ctx.output, &history, |history, w| {
        for event in history {
            writeln!(
                w,
                "v{:<6} {}  {}  feed={}  reviewer={}",
                event.version,
                event.created_at.to_rfc3339(),
                event.actor,
                event.feed_changes.canonical_json(),
                event.reviewer_changes.canonical_json(),
            )?;
            if !event.comment.is_empty() {
                writeln!(w, "        {}", event.comment)?;
            }
        }
        Ok(())
    })
}

/// Move a run to another lifecycle state.
///
/// # Errors
///
/// Fails on an unknown state, guard violations, or storage failures.
pub fn run_move(args: &MoveArgs, ctx: &CmdContext) -> Result<()> {
    let state: RunState = args
        .state
        .parse()
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    let mut store = Store::open(&ctx.db_path)?;
    let record = store.move_run(args.run, state, &ctx.provenance)?;
    print_record(ctx, &record)
}

/// Flag a run as significant.
///
/// # Errors
///
/// Fails on guard violations or storage failures.
pub fn run_significant(args: &SignificantArgs, ctx: &CmdContext) -> Result<()> {
    let mut store = Store::open(&ctx.db_path)?;
    let record = store.mark_significant(args.run, &ctx.provenance)?;
    print_record(ctx, &record)
}
