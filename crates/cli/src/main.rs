mod cli;

use std::{
    fs::{self, OpenOptions},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use config::Environment;
use steam2notion_core::{
    config::{self as app_config, AppConfig},
    NotionGateway, Reconciler,
};
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::cli::{exit_status_for, Cli, Command, EXIT_FAILURE};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging() {
        eprintln!("failed to initialise logging: {err:#}");
        return ExitCode::from(EXIT_FAILURE);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_status_for(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = match cli.config.clone() {
        Some(path) => path,
        None => app_config::ensure_default_config().unwrap_or_else(|err| {
            warn!("could not write default config: {err:#}");
            app_config::config_path()
        }),
    };
    let config = AppConfig::load_from(&path, Environment::default())
        .with_context(|| format!("failed to load configuration ({})", path.display()))?;
    info!(config = ?config, "configuration loaded");

    match cli.command() {
        Command::Sync => {
            let reconciler = Reconciler::new(&config)?;
            let report = reconciler.run().await.context("sync aborted")?;
            if report.failures() > 0 {
                warn!(failures = report.failures(), "some games could not be synced");
            }
        }
        Command::InitDatabase { parent_page } => {
            let notion = NotionGateway::new(&config)?;
            let database = notion
                .ensure_database_schema(&parent_page)
                .await
                .context("failed to provision games database")?;
            if database.created {
                info!(database_id = %database.id, "created games database");
            }
            println!("{}", database.id);
        }
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("steam2notion.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stdout);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
