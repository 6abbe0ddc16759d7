//! CLI entry point for the GTFS loader.
//!
//! Provides subcommands for loading a static feed into PostgreSQL, dry-running
//! a load in memory, resetting the feed tables, and generating network reports.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gtfs_loader::{
    config::DatabaseConfig,
    output::{append_outcomes, print_json, print_pretty},
    pipeline::{PipelineReport, ResetMode, run_pipeline},
    plan::LoadPlan,
    report::generate_reports,
    reset::reset_schema,
    store::{MemoryStore, PgStore},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_loader")]
#[command(about = "Load a static GTFS feed into PostgreSQL and report on it", long_about = None)]
struct Cli {
    /// JSON file with a `database` section; falls back to GTFS_DB_* variables
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset the feed tables and load every GTFS file
    Load {
        /// Directory holding agency.txt, routes.txt, ...
        #[arg(short, long, env = "GTFS_DATA_DIR", default_value = "data/raw/gtfs_static")]
        data_dir: PathBuf,

        /// Append without clearing the tables first
        #[arg(long, default_value_t = false)]
        skip_reset: bool,

        /// CSV file to append per-file outcomes to
        #[arg(short, long)]
        summary: Option<PathBuf>,
    },
    /// Run the load against an in-memory GTFS schema without touching the database
    Check {
        #[arg(short, long, env = "GTFS_DATA_DIR", default_value = "data/raw/gtfs_static")]
        data_dir: PathBuf,

        #[arg(short, long)]
        summary: Option<PathBuf>,
    },
    /// Truncate every feed table
    Reset,
    /// Write network reports (CSV tables and summary.json)
    Report {
        #[arg(short, long, default_value = "outputs/analysis")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_loader.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_loader.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Load {
            data_dir,
            skip_reset,
            summary,
        } => {
            let store = PgStore::new(&database_config(cli.config.as_deref())?);
            let mode = if skip_reset {
                ResetMode::SkipReset
            } else {
                ResetMode::Reset
            };
            let report = run_pipeline(&store, &data_dir, &LoadPlan::gtfs(), mode).await?;
            finish(&report, summary.as_deref())?;
        }
        Commands::Check { data_dir, summary } => {
            let store = MemoryStore::gtfs();
            let report =
                run_pipeline(&store, &data_dir, &LoadPlan::gtfs(), ResetMode::Reset).await?;
            finish(&report, summary.as_deref())?;
        }
        Commands::Reset => {
            let store = PgStore::new(&database_config(cli.config.as_deref())?);
            reset_schema(&store, &LoadPlan::gtfs().reset_tables).await?;
            info!("All feed tables cleared");
        }
        Commands::Report { output_dir } => {
            let store = PgStore::new(&database_config(cli.config.as_deref())?);
            let client = store.connect().await?;
            let summary = generate_reports(&client, &output_dir).await?;
            info!(
                output_dir = %output_dir.display(),
                isolated_stops = summary.isolated_stop_count,
                "Reports written"
            );
        }
    }

    Ok(())
}

fn database_config(path: Option<&Path>) -> Result<DatabaseConfig> {
    let config = match path {
        Some(path) => DatabaseConfig::load(path)
            .with_context(|| format!("loading database config from {}", path.display()))?,
        None => DatabaseConfig::from_env().context("reading database config from environment")?,
    };
    info!(host = %config.host, port = config.port, database = %config.database, "Database configured");
    Ok(config)
}

/// Logs the end-of-run summary and optionally appends it to a CSV file.
fn finish(report: &PipelineReport, summary: Option<&Path>) -> Result<()> {
    print_pretty(report);

    for outcome in report.failed() {
        warn!(
            file = %outcome.file,
            error = outcome.error_message.as_deref().unwrap_or(""),
            "File failed to load"
        );
    }
    for outcome in report.skipped() {
        info!(file = %outcome.file, "File skipped");
    }

    if let Some(path) = summary {
        append_outcomes(path, &report.outcomes)?;
        info!(path = %path.display(), "Summary appended");
    } else {
        print_json(report)?;
    }

    info!(
        loaded = report.loaded().len(),
        skipped = report.skipped().len(),
        failed = report.failed().len(),
        rows_loaded = report.total_rows_loaded(),
        "Load finished"
    );
    Ok(())
}
