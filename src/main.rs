mod db;
mod error;
mod fetcher;
mod model;
mod normalize;
mod pipeline;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::error::ConfigError;
use crate::fetcher::HttpPageSource;
use crate::model::LoadMode;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "policy_sync", about = "Policy Open API → SQLite loader")]
struct Cli {
    /// .env file to load before reading POLICY_* variables (default: ./.env if present)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    /// Optional config file (toml/yaml/json), overridden by POLICY_* variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan pages 1-99 of every category and bulk insert with sequence ids
    Full,
    /// Scan pages 1-2 of every category and upsert by url
    Sync,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}

fn load_settings(cli: &Cli) -> Result<Settings, ConfigError> {
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Settings::load(cli.config.as_deref())
}

fn main() -> Result<()> {
    init_tracing();
    let t0 = Instant::now();
    let cli = Cli::parse();

    let mode = match &cli.command {
        Commands::Full => LoadMode::Full,
        Commands::Sync => LoadMode::Incremental,
    };

    let settings = load_settings(&cli).context("configuration")?;
    info!(settings = ?settings, %mode, "starting");

    let source = HttpPageSource::new(&settings.api).context("configuration")?;
    let conn = db::connect(&settings.store.db_path)
        .with_context(|| format!("failed to open {:?}", settings.store.db_path))?;
    db::init_schema(&conn, &settings.store.table)
        .with_context(|| format!("failed to create table {:?}", settings.store.table))?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let summary = pipeline::run(&settings, mode, &source, &conn, &pb)
        .map_err(|e| {
            let stage = e.stage();
            anyhow::Error::new(e).context(format!("{} failed at the {} stage", mode, stage))
        })?;

    println!("{}", summary);
    println!("Done in {:.1}s", t0.elapsed().as_secs_f64());
    Ok(())
}
