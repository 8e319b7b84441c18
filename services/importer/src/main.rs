//! Importer CLI - Loads podcast download spreadsheets into the download store
//!
//! Usage:
//!   importer data/uploads/20240115_podcast_downloads.xlsx
//!   importer report0416.xls --dry-run
//!   importer --dir data/initial_logs --reset-db
//!   importer --initial-logs --json

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use importer::config::Config;
use importer::stats::action_summary;
use importer::{DownloadStore, ImportOptions, Importer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "importer", about = "Imports podcast download spreadsheets into the download store")]
struct Args {
    /// Spreadsheet to import (report*.xls[x] or YYYYMMDD_podcast_downloads.xls[x])
    #[arg(value_name = "FILE", conflicts_with_all = ["dir", "initial_logs"])]
    file: Option<PathBuf>,

    /// Import every spreadsheet in a directory (monthly files first)
    #[arg(long, conflicts_with = "initial_logs")]
    dir: Option<PathBuf>,

    /// Import the directory named by INITIAL_LOGS_DIR
    #[arg(long, default_value = "false")]
    initial_logs: bool,

    /// Dry run - report what would change, write nothing
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Delete every stored record before importing
    #[arg(long, default_value = "false")]
    reset_db: bool,

    /// Legacy flag, accepted and ignored (the file type decides the policy)
    #[arg(long = "override", default_value = "false")]
    override_existing: bool,

    /// Print the statistics as JSON instead of the text summary
    #[arg(long, default_value = "false")]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "importer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    if let Some(db_file) = config.database_file() {
        if let Some(parent) = db_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
        }
    }

    let store = DownloadStore::connect(&config.db_url)
        .await
        .with_context(|| format!("Failed to open download store at {}", config.db_url))?;

    let options = ImportOptions {
        dry_run: args.dry_run,
        reset_db: args.reset_db,
        override_existing: args.override_existing,
        asset_marker: config.asset_marker.clone(),
    };
    let mut importer = Importer::start(store, options)
        .await
        .context("Failed to prepare download store")?;

    if let Some(file) = &args.file {
        let report = importer
            .import_file(file)
            .await
            .with_context(|| format!("Failed to import {}", file.display()))?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&report.stats)?);
        } else {
            println!("{}", report.render());
            println!(
                "Action Taken: {}",
                action_summary(Some(report.file_type), args.dry_run, args.reset_db)
            );
        }
    } else {
        let dir = match (&args.dir, args.initial_logs) {
            (Some(dir), _) => dir.clone(),
            (None, true) => config.initial_logs_dir.clone(),
            (None, false) => bail!("Nothing to import: pass a FILE, --dir <DIR> or --initial-logs"),
        };

        let batch = importer
            .import_directory(&dir)
            .await
            .with_context(|| format!("Failed to import directory {}", dir.display()))?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&batch.total)?);
        } else {
            println!("{}", batch.render());
        }
    }

    importer
        .into_store()
        .close()
        .await
        .context("Failed to close download store")?;

    Ok(())
}
