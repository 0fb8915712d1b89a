//! Emeroteca CLI
//!
//! Drives the three independent modes: crawl a date range, audit all
//! local day workspaces, upload all local day workspaces.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use emeroteca::{
    error::{AppError, Result},
    models::Config,
    pipeline,
    services::{HttpArchiveSource, HttpRemoteStore},
    storage::{RetryLedger, WorkspaceRoot},
    utils::{self, CancelFlag},
};

/// Emeroteca - day-by-day newspaper archive crawler
#[derive(Parser, Debug)]
#[command(
    name = "emeroteca",
    version,
    about = "Crawl, audit, and upload a day-indexed newspaper archive"
)]
struct Cli {
    /// Path to storage directory containing config and day workspaces
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a date range, one resumable day at a time
    Crawl {
        /// First day (YYYY-MM-DD); defaults to archive.start_date
        #[arg(long)]
        from: Option<String>,

        /// Last day, inclusive (YYYY-MM-DD); defaults to archive.end_date
        #[arg(long)]
        to: Option<String>,

        /// Edition/headboard code; defaults to archive.edition
        #[arg(long)]
        edition: Option<String>,
    },

    /// Recount persisted images against expected page counts
    Audit,

    /// Upload all local day workspaces to the content store
    Upload,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let mut config = Config::load_or_default(&config_path);

    let root = WorkspaceRoot::new(&cli.storage_dir);
    root.ensure().await?;

    match cli.command {
        Command::Crawl { from, to, edition } => {
            if let Some(edition) = edition {
                config.archive.edition = edition;
            }
            config.validate()?;
            let config = Arc::new(config);

            let from = utils::parse_day(from.as_deref().unwrap_or(&config.archive.start_date))?;
            let to = utils::parse_day(to.as_deref().unwrap_or(&config.archive.end_date))?;
            let days = utils::date_range(from, to);
            if days.is_empty() {
                return Err(AppError::config(format!("empty date range {}..{}", from, to)));
            }

            let cancel = CancelFlag::new();
            let ctrl_c_flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupt received; finishing the current page write");
                    ctrl_c_flag.cancel();
                }
            });

            let source = HttpArchiveSource::new(Arc::clone(&config))?;
            let ledger = RetryLedger::new(cli.storage_dir.join("retry.log"));

            log::info!(
                "Crawling edition {} from {} to {}",
                config.archive.edition,
                from,
                to
            );
            pipeline::run_crawl(&source, &root, &ledger, &config, &days, &cancel).await?;
        }

        Command::Audit => {
            let report = pipeline::run_audit(&root).await?;
            for bad in report.inconsistent() {
                log::error!(
                    "{}: {} images / {} expected ({})",
                    bad.day,
                    bad.image_count,
                    bad.expected_pages,
                    bad.identifier
                        .as_ref()
                        .map(|id| id.describe())
                        .unwrap_or_else(|| "unknown issue".to_string())
                );
            }
            if !report.is_consistent() {
                return Err(AppError::validation(format!(
                    "{} of {} days inconsistent",
                    report.inconsistent_count(),
                    report.days.len()
                )));
            }
        }

        Command::Upload => {
            config.validate()?;
            let config = Arc::new(config);
            let store = HttpRemoteStore::new(Arc::clone(&config))?;

            let stats = pipeline::run_upload(&store, &root, &config).await?;
            if stats.failed > 0 {
                return Err(AppError::validation(format!(
                    "{} days failed to upload",
                    stats.failed
                )));
            }
        }
    }

    Ok(())
}
