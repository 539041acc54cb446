use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use helios_core::config::PipelineConfig;
use helios_core::pipeline::EtlPipeline;
use helios_core::sink::PostgresSink;
use helios_core::sources::FileSource;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Solar-plant ETL pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline once: load, transform, clean, persist
    Run(ConfigArgs),
    /// Parse the configuration and report the table plan without touching the database
    Validate(ConfigArgs),
}

#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// Path to the pipeline TOML config; defaults to the built-in plant layout
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let config = load_config(args.config.as_deref())?;
            let pool = connect_pool().await?;
            let pipeline = EtlPipeline::new(config, FileSource::new(), PostgresSink::new(pool));
            let summary = pipeline.run().await?;

            for (table, rows) in &summary.loaded_rows {
                info!(table = %table, rows = *rows, "input table");
            }
            for (destination, rows) in &summary.inserted_rows {
                info!(destination = %destination, rows = *rows, "persisted");
            }
            for destination in &summary.failed_destinations {
                warn!(destination = %destination, "insert failed; no rows persisted for this destination");
            }
            if summary.failed_destinations.is_empty() {
                info!("pipeline run succeeded");
            } else {
                warn!("pipeline run finished with failed destinations");
            }
            Ok(())
        }
        Command::Validate(args) => {
            let config = load_config(args.config.as_deref())?;
            for table in &config.tables {
                info!(
                    table = %table.name,
                    path = %table.path,
                    date_column = %table.date_column,
                    time_column = table.time_column.as_deref().unwrap_or("-"),
                    rename = table.rename.as_deref().unwrap_or("-"),
                    "planned input"
                );
            }
            info!(
                energy_destination = %config.destinations.energy,
                pvsyst_destination = %config.destinations.pvsyst,
                "configuration is valid"
            );
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

async fn connect_pool() -> Result<sqlx::PgPool> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("HELIOS_DATABASE_URL"))
        .context("DATABASE_URL (or HELIOS_DATABASE_URL) must be set")?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to the database")?;
    Ok(pool)
}
