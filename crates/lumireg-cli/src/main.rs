#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::CmdContext;
use lumireg_core::config::LedgerConfig;
use lumireg_store::Provenance;
use output::OutputMode;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "lumireg: event-sourced quality ledger for run lumisections",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Path to the ledger database (default: platform data dir).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to the whitelist configuration (default: `./lumireg.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Actor recorded on mutating commands (default: `$LUMIREG_ACTOR`).
    #[arg(long, global = true)]
    actor: Option<String>,

    /// Comment recorded on mutating commands.
    #[arg(long, global = true, default_value = "")]
    comment: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Initialize the ledger database",
        after_help = "EXAMPLES:\n    # Create the ledger in the default data directory\n    lr init\n\n    # Create it somewhere specific\n    lr --db ./ledger.sqlite3 init"
    )]
    Init,

    #[command(
        about = "Register a new run from an observed JSON file",
        after_help = "EXAMPLES:\n    # Register run 355001 with attributes and lumisections\n    lr --actor shifter@example.org new-run run-355001.json"
    )]
    NewRun(cmd::run::NewRunArgs),

    #[command(
        about = "Apply an observed update to an open run",
        after_help = "EXAMPLES:\n    lr --actor shifter@example.org edit-run 355001 update.json"
    )]
    EditRun(cmd::run::EditRunArgs),

    #[command(
        about = "Converge a run's feed attributes to an observed set",
        after_help = "EXAMPLES:\n    lr --actor dqm-bot refresh 355001 observed-feed.json"
    )]
    Refresh(cmd::run::RefreshArgs),

    #[command(
        about = "Ingest an observed lumisection sequence",
        after_help = "EXAMPLES:\n    # Initial reviewer verdicts for run 355001\n    lr --actor shifter@example.org ingest 355001 verdicts.json\n\n    # Converge existing history to a new observation\n    lr --actor dqm-bot ingest 355001 --source feed --update observed.json"
    )]
    Ingest(cmd::slices::IngestArgs),

    #[command(
        about = "Show the compact range view of a dataset",
        after_help = "EXAMPLES:\n    lr ranges 355001 --source reviewer\n    lr ranges 355001 --dataset online --all-attributes --json"
    )]
    Ranges(cmd::slices::RangesArgs),

    #[command(
        about = "Show the dense per-slice reconstruction of a dataset",
        after_help = "EXAMPLES:\n    lr slices 355001 --source feed"
    )]
    Slices(cmd::slices::SlicesArgs),

    #[command(
        about = "Show one run's merged attributes",
        after_help = "EXAMPLES:\n    lr show 355001 --json"
    )]
    Show(cmd::run::ShowArgs),

    #[command(
        about = "List a run's full change history with authorship",
        after_help = "EXAMPLES:\n    lr history 355001"
    )]
    History(cmd::run::HistoryArgs),

    #[command(
        name = "move",
        about = "Move a run to another lifecycle state",
        after_help = "EXAMPLES:\n    lr --actor shifter@example.org move 355001 SIGNOFF"
    )]
    Move(cmd::run::MoveArgs),

    #[command(
        about = "Flag a run as significant",
        after_help = "EXAMPLES:\n    lr --actor shifter@example.org significant 355001"
    )]
    Significant(cmd::run::SignificantArgs),

    #[command(
        about = "Compare an observed feed batch against stored runs",
        after_help = "EXAMPLES:\n    lr plan-sync observed-batch.json --window 50"
    )]
    PlanSync(cmd::run::PlanSyncArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,lumireg_core=debug,lumireg_store=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_db_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from("lumireg.sqlite3"),
        |dir| dir.join("lumireg").join("ledger.sqlite3"),
    )
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("lumireg.toml"));
    let config = LedgerConfig::load(&config_path)?;

    let actor = cli
        .actor
        .clone()
        .or_else(|| std::env::var("LUMIREG_ACTOR").ok())
        .unwrap_or_default();
    let ctx = CmdContext {
        db_path,
        config,
        output: if cli.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        },
        provenance: Provenance::new(actor, cli.comment.clone()),
    };

    match cli.command {
        Commands::Init => cmd::init::run_init(&ctx),
        Commands::NewRun(ref args) => cmd::run::run_new(args, &ctx),
        Commands::EditRun(ref args) => cmd::run::run_edit(args, &ctx),
        Commands::Refresh(ref args) => cmd::run::run_refresh(args, &ctx),
        Commands::Ingest(ref args) => cmd::slices::run_ingest(args, &ctx),
        Commands::Ranges(ref args) => cmd::slices::run_ranges(args, &ctx),
        Commands::Slices(ref args) => cmd::slices::run_slices(args, &ctx),
        Commands::Show(ref args) => cmd::run::run_show(args, &ctx),
        Commands::History(ref args) => cmd::run::run_history(args, &ctx),
        Commands::Move(ref args) => cmd::run::run_move(args, &ctx),
        Commands::Significant(ref args) => cmd::run::run_significant(args, &ctx),
        Commands::PlanSync(ref args) => cmd::run::run_plan_sync(args, &ctx),
    }
}
