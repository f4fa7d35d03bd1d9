//! Lumisection commands: ingest, converge, and the compact range views.

use super::CmdContext;
use crate::output::render;
use anyhow::{Context, Result};
use clap::Args;
use lumireg_core::Whitelist;
use lumireg_core::model::{RunNumber, Source};
use lumireg_store::Store;
use lumireg_store::store::ONLINE_DATASET;
use std::io::Write;
use std::path::PathBuf;

/// Arguments shared by the lumisection commands.
#[derive(Args, Debug)]
pub struct SliceSelector {
    /// Run number.
    pub run: RunNumber,

    /// Dataset name.
    #[arg(long, default_value = ONLINE_DATASET)]
    pub dataset: String,

    /// Attribute source: feed or reviewer.
    #[arg(long, default_value = "reviewer")]
    pub source: String,

    /// Compare full documents instead of the configured whitelist.
    #[arg(long)]
    pub all_attributes: bool,
}

impl SliceSelector {
    fn source(&self) -> Result<Source> {
        self.source.parse().map_err(|err| anyhow::anyhow!("{err}"))
    }

    fn whitelist(&self, ctx: &CmdContext) -> Result<Whitelist> {
        if self.all_attributes {
            return Ok(Whitelist::All);
        }
        Ok(ctx.config.whitelist_for(self.source()?))
    }
}

/// Arguments for `lr ingest`.
#[derive(Args, Debug)]
pub struct IngestArgs {
    #[command(flatten)]
    pub selector: SliceSelector,

    /// JSON file with the observed dense lumisection sequence.
    pub file: PathBuf,

    /// Converge existing history instead of writing an initial sequence.
    #[arg(long)]
    pub update: bool,
}

/// Arguments for `lr ranges`.
#[derive(Args, Debug)]
pub struct RangesArgs {
    #[command(flatten)]
    pub selector: SliceSelector,
}

/// Arguments for `lr slices`.
#[derive(Args, Debug)]
pub struct SlicesArgs {
    #[command(flatten)]
    pub selector: SliceSelector,
}

/// Ingest an observed lumisection sequence.
///
/// Without `--update` the sequence is compacted and stored as the initial
/// history; with `--update` the differential updater converges the stored
/// history to the observation.
///
/// # Errors
///
/// Fails on unreadable input, a length mismatch during update, attribution
/// or storage failures.
pub fn run_ingest(args: &IngestArgs, ctx: &CmdContext) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("read {}", args.file.display()))?;
    let observed: Vec<lumireg_core::Document> =
        serde_json::from_str(&content).with_context(|| format!("parse {}", args.file.display()))?;

    let source = args.selector.source()?;
    let whitelist = args.selector.whitelist(ctx)?;
    let mut store = Store::open(&ctx.db_path)?;
    let ranges = if args.update {
        store.update_lumisections(
            args.selector.run,
            &args.selector.dataset,
            source,
            &observed,
            &whitelist,
            &ctx.provenance,
        )?
    } else {
        store.create_lumisections(
            args.selector.run,
            &args.selector.dataset,
            source,
            &observed,
            &whitelist,
            &ctx.provenance,
        )?
    };

    render(ctx.output, &ranges, |ranges, w| {
        if ranges.is_empty() {
            writeln!(w, "nothing changed")
        } else {
            writeln!(w, "wrote {} range(s)", ranges.len())
        }
    })
}

/// Print the compact range view of a dataset.
///
/// # Errors
///
/// Fails on storage failures.
pub fn run_ranges(args: &RangesArgs, ctx: &CmdContext) -> Result<()> {
    let source = args.selector.source()?;
    let whitelist = args.selector.whitelist(ctx)?;
    let store = Store::open(&ctx.db_path)?;
    let ranges = store.ranges(args.selector.run, &args.selector.dataset, source, &whitelist)?;

    render(ctx.output, &ranges, |ranges, w| {
        for range in ranges {
            writeln!(
                w,
                "{:>6}..{:<6} {}",
                range.start,
                range.end,
                range.values.canonical_json()
            )?;
        }
        Ok(())
    })
}

/// Print the dense reconstruction of a dataset.
///
/// # Errors
///
/// Fails on storage failures.
pub fn run_slices(args: &SlicesArgs, ctx: &CmdContext) -> Result<()> {
    let source = args.selector.source()?;
    let store = Store::open(&ctx.db_path)?;
    let slices = store.reconstruct(args.selector.run, &args.selector.dataset, source)?;

    render(ctx.output, &slices, |slices, w| {
        for (number, slice) in (1..).zip(slices.iter()) {
            writeln!(w, "{number:>6} {}", slice.canonical_json())?;
        }
        Ok(())
    })
}
