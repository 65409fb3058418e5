use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sparkify_warehouse::config::{
    AppConfig, CliConfig, FileConfig, DEFAULT_BATCH_SIZE, DEFAULT_DURATION_TOLERANCE_SECS,
    DEFAULT_LOAD_TIMEOUT_SECS,
};
use sparkify_warehouse::pipeline::{self, ComponentStatus, RunReport};
use sparkify_warehouse::warehouse::{SqliteWarehouse, WarehouseStore};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;
use cli_style::{get_styles, RowState};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "sparkify-warehouse", version = VERSION, styles = get_styles())]
/// Loads Sparkify listening logs and the song catalog into a star schema.
struct CliArgs {
    /// Path to a TOML config file. Its values override command line flags.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Warehouse database, a file path or sqlite://path.
    #[clap(long, global = true)]
    pub destination: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drops and recreates every staging and warehouse relation.
    ResetSchema,

    /// Stages both sources, builds dimensions and songplays, and loads them.
    Run(RunArgs),

    /// Shows the row count of every relation.
    Stats,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// File or directory of event logs (JSON lines).
    #[clap(long, value_parser = parse_path)]
    pub events: Option<PathBuf>,

    /// File or directory of song catalog files.
    #[clap(long, value_parser = parse_path)]
    pub songs: Option<PathBuf>,

    /// Rows committed per sink transaction.
    #[clap(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Timeout of each staging load and table write.
    #[clap(long, default_value_t = DEFAULT_LOAD_TIMEOUT_SECS)]
    pub load_timeout_secs: u64,

    /// Largest accepted gap between event length and catalog duration.
    #[clap(long, default_value_t = DEFAULT_DURATION_TOLERANCE_SECS)]
    pub duration_tolerance_secs: f64,

    /// Fail on dimension keys seen with conflicting attributes.
    #[clap(long)]
    pub strict_integrity: bool,

    /// Fail a staging load rejecting more records than this.
    #[clap(long)]
    pub max_rejected: Option<usize>,
}

fn cli_config(args: &CliArgs) -> CliConfig {
    let mut cli = CliConfig {
        destination: args.destination.clone(),
        ..Default::default()
    };
    if let Command::Run(run) = &args.command {
        cli.source_events = run.events.clone();
        cli.source_songs = run.songs.clone();
        cli.batch_size = run.batch_size;
        cli.load_timeout_secs = run.load_timeout_secs;
        cli.duration_tolerance_secs = run.duration_tolerance_secs;
        cli.strict_integrity = run.strict_integrity;
        cli.max_rejected = run.max_rejected;
    }
    cli
}

fn print_report(report: &RunReport) {
    const COLUMNS: [usize; 6] = [16, 8, 9, 9, 8, 8];

    cli_style::print_section_header("Run Report");
    cli_style::print_table_row(
        &[
            ("relation", COLUMNS[0]),
            ("read", COLUMNS[1]),
            ("rejected", COLUMNS[2]),
            ("produced", COLUMNS[3]),
            ("written", COLUMNS[4]),
            ("status", COLUMNS[5]),
        ],
        RowState::Neutral,
    );

    for r in &report.relations {
        let state = match r.status {
            ComponentStatus::Ok => RowState::Ok,
            ComponentStatus::Failed { .. } => RowState::Failed,
            ComponentStatus::Skipped { .. } | ComponentStatus::Pending => RowState::Skipped,
        };
        let (read, rejected, produced, written) = (
            r.read.to_string(),
            r.rejected.to_string(),
            r.produced.to_string(),
            r.written.to_string(),
        );
        cli_style::print_table_row(
            &[
                (r.relation, COLUMNS[0]),
                (&read, COLUMNS[1]),
                (&rejected, COLUMNS[2]),
                (&produced, COLUMNS[3]),
                (&written, COLUMNS[4]),
                (r.status.label(), COLUMNS[5]),
            ],
            state,
        );
        match &r.status {
            ComponentStatus::Failed { kind, message } => {
                cli_style::print_table_detail(&format!("{}: {}", kind, message))
            }
            ComponentStatus::Skipped { reason } => cli_style::print_table_detail(reason),
            _ => {}
        }
        if let Some(matched) = r.matched {
            cli_style::print_table_detail(&format!(
                "{} of {} plays matched a catalog song",
                matched, r.produced
            ));
        }
        if r.conflicts > 0 {
            cli_style::print_table_detail(&format!(
                "{} rows already present, skipped by the conflict policy",
                r.conflicts
            ));
        }
    }
    cli_style::print_section_footer();
    cli_style::print_key_value("elapsed", &format!("{:.2?}", report.elapsed));

    if report.is_success() {
        cli_style::print_success("All relations loaded");
    } else {
        cli_style::print_error("Run failed, see the report above");
    }
}

async fn execute(args: CliArgs) -> Result<bool> {
    let file_config = args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = AppConfig::resolve(&cli_config(&args), file_config)?;

    if config.credentials.is_some() {
        warn!("Credentials are configured but ignored by the SQLite destination");
        cli_style::print_warning("Credentials are ignored by the SQLite destination");
    }

    info!("Opening warehouse database at {:?}...", config.destination);
    match args.command {
        Command::ResetSchema => {
            let store: Arc<dyn WarehouseStore> =
                Arc::new(SqliteWarehouse::open_unvalidated(&config.destination)?);
            pipeline::reset_schema(store).await?;
            cli_style::print_success("Schema recreated");
            Ok(true)
        }
        Command::Stats => {
            let store: Arc<dyn WarehouseStore> =
                Arc::new(SqliteWarehouse::open(&config.destination)?);
            let counts = pipeline::relation_counts(store).await?;
            cli_style::print_section_header("Relations");
            for (relation, count) in counts {
                let count = count.to_string();
                cli_style::print_table_row(&[(relation, 16), (&count, 10)], RowState::Neutral);
            }
            cli_style::print_section_footer();
            Ok(true)
        }
        Command::Run(_) => {
            config.require_sources()?;
            let store: Arc<dyn WarehouseStore> = Arc::new(
                SqliteWarehouse::open(&config.destination)
                    .context("Cannot open the warehouse")?,
            );
            let report = pipeline::run_pipeline(&config, store).await?;
            report.log_summary();
            print_report(&report);
            Ok(report.is_success())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args = CliArgs::parse();

    if let Err(e) = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
    {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match execute(cli_args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            cli_style::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
